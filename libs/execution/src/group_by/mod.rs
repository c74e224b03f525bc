//! Per-segment group-by aggregation.
//!
//! Two strategies implement [`GroupByAccumulator`]: [`TrieGroupBy`] walks a
//! prefix tree of dictionary ids and only decodes each group key once, while
//! [`HashGroupBy`] hashes decoded values and works for any column. The plan
//! maker picks one per segment.

mod hash;
mod key;
mod trie;

use ahash::AHashMap;
use anyhow::Result;
use quarry_request::AggregationInfo;

use crate::aggregation::{new_accumulators, Accumulator};
use crate::operators::ProjectionBlock;

pub use hash::HashGroupBy;
pub use key::GroupKey;
pub use trie::TrieGroupBy;

pub trait GroupByAccumulator: Send {
    /// Folds the rows of one projected batch into their groups.
    fn aggregate(&mut self, block: &ProjectionBlock) -> Result<()>;

    fn num_groups(&self) -> usize;

    /// Flattens the groups, first-seen group first.
    fn into_result(self: Box<Self>) -> Result<GroupByResult>;
}

pub type BoxGroupByAccumulator = Box<dyn GroupByAccumulator>;

/// Groups and their accumulators in insertion order.
#[derive(Debug, Clone, Default)]
pub struct GroupByResult {
    index: AHashMap<GroupKey, usize>,
    groups: Vec<(GroupKey, Vec<Accumulator>)>,
}

impl PartialEq for GroupByResult {
    fn eq(&self, other: &Self) -> bool {
        self.groups == other.groups
    }
}

impl GroupByResult {
    #[inline]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    #[inline]
    pub fn groups(&self) -> &[(GroupKey, Vec<Accumulator>)] {
        &self.groups
    }

    pub fn get(&self, key: &GroupKey) -> Option<&[Accumulator]> {
        self.index
            .get(key)
            .map(|index| self.groups[*index].1.as_slice())
    }

    /// Returns the accumulators of `key`, appending a fresh group if absent.
    pub(crate) fn accumulators_mut(
        &mut self,
        key: GroupKey,
        aggregations: &[AggregationInfo],
    ) -> &mut Vec<Accumulator> {
        let index = match self.index.get(&key) {
            Some(index) => *index,
            None => {
                let index = self.groups.len();
                self.index.insert(key.clone(), index);
                self.groups.push((key, new_accumulators(aggregations)));
                index
            }
        };
        &mut self.groups[index].1
    }

    /// Adds one group, merging it into an existing group with the same key.
    pub fn insert(&mut self, key: GroupKey, accumulators: Vec<Accumulator>) -> Result<()> {
        match self.index.get(&key) {
            Some(index) => {
                let existing = &mut self.groups[*index].1;
                anyhow::ensure!(
                    existing.len() == accumulators.len(),
                    "group {} has {} accumulators but {} were merged",
                    key,
                    existing.len(),
                    accumulators.len()
                );
                for (existing, other) in existing.iter_mut().zip(&accumulators) {
                    existing.merge(other)?;
                }
            }
            None => {
                self.index.insert(key.clone(), self.groups.len());
                self.groups.push((key, accumulators));
            }
        }
        Ok(())
    }

    /// Merges `other` into `self`; groups new to `self` are appended in the
    /// order of `other`.
    pub fn merge(&mut self, other: GroupByResult) -> Result<()> {
        for (key, accumulators) in other.groups {
            self.insert(key, accumulators)?;
        }
        Ok(())
    }

    pub fn into_groups(self) -> Vec<(GroupKey, Vec<Accumulator>)> {
        self.groups
    }
}
