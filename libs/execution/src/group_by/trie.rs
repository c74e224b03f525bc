use ahash::AHashMap;
use anyhow::{Context, Result};
use quarry_request::AggregationInfo;
use quarry_segment::{ColumnBlock, DictionaryRef};

use crate::aggregation::{new_accumulators, Accumulator, AggregationInputs};
use crate::group_by::{GroupByAccumulator, GroupByResult, GroupKey};
use crate::operators::ProjectionBlock;

#[derive(Default)]
struct TrieNode {
    children: AHashMap<u32, usize>,
    group: Option<usize>,
}

/// Group-by over dictionary encoded columns.
///
/// Level `i` of the trie branches on the dictionary id of group column `i`,
/// so every distinct id tuple maps to exactly one leaf. Leaves point into
/// `groups`, which keeps first-seen order. With no group columns the root is
/// the only leaf.
pub struct TrieGroupBy {
    columns: Vec<String>,
    dictionaries: Vec<DictionaryRef>,
    aggregations: Vec<AggregationInfo>,
    nodes: Vec<TrieNode>,
    groups: Vec<(Vec<u32>, Vec<Accumulator>)>,
}

impl TrieGroupBy {
    pub fn new(
        columns: Vec<String>,
        dictionaries: Vec<DictionaryRef>,
        aggregations: Vec<AggregationInfo>,
    ) -> Self {
        Self {
            columns,
            dictionaries,
            aggregations,
            nodes: vec![TrieNode::default()],
            groups: Vec::new(),
        }
    }

    fn child(&mut self, node: usize, id: u32) -> usize {
        if let Some(child) = self.nodes[node].children.get(&id) {
            return *child;
        }
        let child = self.nodes.len();
        self.nodes.push(TrieNode::default());
        self.nodes[node].children.insert(id, child);
        child
    }

    fn leaf_group(&mut self, leaf: usize, path: &[u32]) -> usize {
        if let Some(group) = self.nodes[leaf].group {
            return group;
        }
        let group = self.groups.len();
        self.groups
            .push((path.to_vec(), new_accumulators(&self.aggregations)));
        self.nodes[leaf].group = Some(group);
        group
    }
}

impl GroupByAccumulator for TrieGroupBy {
    fn aggregate(&mut self, block: &ProjectionBlock) -> Result<()> {
        let mut group_columns = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let column_block = block
                .column(column)
                .with_context(|| format!("group column '{}' is not projected", column))?;
            anyhow::ensure!(
                matches!(column_block, ColumnBlock::Dictionary { .. }),
                "group column '{}' is not dictionary encoded",
                column
            );
            group_columns.push(column_block);
        }
        let inputs = AggregationInputs::resolve(&self.aggregations, block)?;

        let mut path = Vec::with_capacity(group_columns.len());
        for row in 0..block.len() {
            path.clear();
            let mut node = 0;
            for column_block in &group_columns {
                let id = column_block.dict_id(row).unwrap_or_default();
                path.push(id);
                node = self.child(node, id);
            }
            let group = self.leaf_group(node, &path);
            inputs.update(&mut self.groups[group].1, row);
        }
        Ok(())
    }

    fn num_groups(&self) -> usize {
        self.groups.len()
    }

    fn into_result(self: Box<Self>) -> Result<GroupByResult> {
        let TrieGroupBy {
            columns,
            dictionaries,
            groups,
            ..
        } = *self;
        let mut result = GroupByResult::default();
        for (path, accumulators) in groups {
            let key = path
                .iter()
                .zip(&dictionaries)
                .zip(&columns)
                .map(|((id, dictionary), column)| {
                    dictionary.value(*id).cloned().with_context(|| {
                        format!("unknown dictionary id {} in group column '{}'", id, column)
                    })
                })
                .collect::<Result<GroupKey>>()?;
            result.insert(key, accumulators)?;
        }
        Ok(result)
    }
}
