use std::sync::Arc;

use itertools::Itertools;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use quarry_request::{AggregationInfo, GroupBy};
use quarry_segment::DictionaryRef;

use crate::group_by::{BoxGroupByAccumulator, HashGroupBy, TrieGroupBy};
use crate::operators::{AggregationGroupByOperator, AggregationOperator};
use crate::plan::{child_prefix, PlanNode, ProjectionPlanNode};
use crate::{BlockOperatorRef, CancelFlag, Result};

pub struct AggregationPlanNode {
    projection: Arc<ProjectionPlanNode>,
    aggregations: Vec<AggregationInfo>,
    total_docs: u64,
    cancel: CancelFlag,
    operator: OnceCell<BlockOperatorRef>,
}

impl AggregationPlanNode {
    pub fn new(
        projection: Arc<ProjectionPlanNode>,
        aggregations: Vec<AggregationInfo>,
        total_docs: u64,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            projection,
            aggregations,
            total_docs,
            cancel,
            operator: OnceCell::new(),
        }
    }
}

impl PlanNode for AggregationPlanNode {
    type Operator = BlockOperatorRef;

    fn run(&self) -> Result<Self::Operator> {
        self.operator
            .get_or_try_init(|| -> Result<BlockOperatorRef> {
                Ok(Arc::new(Mutex::new(AggregationOperator::new(
                    self.projection.run()?,
                    self.aggregations.clone(),
                    self.total_docs,
                    self.cancel.clone(),
                ))))
            })
            .map(Clone::clone)
    }

    fn show_tree(&self, prefix: &str) {
        tracing::debug!(
            "{}Aggregation(functions: [{}])",
            prefix,
            self.aggregations
                .iter()
                .map(AggregationInfo::function_name)
                .join(", ")
        );
        self.projection.show_tree(&child_prefix(prefix));
    }
}

/// How a segment groups documents, decided when the plan is compiled.
#[derive(Clone)]
pub enum GroupByStrategy {
    /// Trie over the dictionaries of the group columns, in column order.
    Trie(Vec<DictionaryRef>),
    Hash,
}

impl GroupByStrategy {
    fn name(&self) -> &'static str {
        match self {
            GroupByStrategy::Trie(_) => "trie",
            GroupByStrategy::Hash => "hash",
        }
    }
}

pub struct AggregationGroupByPlanNode {
    projection: Arc<ProjectionPlanNode>,
    group_by: GroupBy,
    aggregations: Vec<AggregationInfo>,
    strategy: GroupByStrategy,
    total_docs: u64,
    cancel: CancelFlag,
    operator: OnceCell<BlockOperatorRef>,
}

impl AggregationGroupByPlanNode {
    pub fn new(
        projection: Arc<ProjectionPlanNode>,
        group_by: GroupBy,
        aggregations: Vec<AggregationInfo>,
        strategy: GroupByStrategy,
        total_docs: u64,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            projection,
            group_by,
            aggregations,
            strategy,
            total_docs,
            cancel,
            operator: OnceCell::new(),
        }
    }

    fn create_accumulator(&self) -> BoxGroupByAccumulator {
        let columns = self.group_by.columns.clone();
        let aggregations = self.aggregations.clone();
        match &self.strategy {
            GroupByStrategy::Trie(dictionaries) => Box::new(TrieGroupBy::new(
                columns,
                dictionaries.clone(),
                aggregations,
            )),
            GroupByStrategy::Hash => Box::new(HashGroupBy::new(columns, aggregations)),
        }
    }
}

impl PlanNode for AggregationGroupByPlanNode {
    type Operator = BlockOperatorRef;

    fn run(&self) -> Result<Self::Operator> {
        self.operator
            .get_or_try_init(|| -> Result<BlockOperatorRef> {
                Ok(Arc::new(Mutex::new(AggregationGroupByOperator::new(
                    self.projection.run()?,
                    self.create_accumulator(),
                    self.total_docs,
                    self.cancel.clone(),
                ))))
            })
            .map(Clone::clone)
    }

    fn show_tree(&self, prefix: &str) {
        tracing::debug!(
            "{}AggregationGroupBy(functions: [{}], group_by: [{}], top_n: {}, strategy: {})",
            prefix,
            self.aggregations
                .iter()
                .map(AggregationInfo::function_name)
                .join(", "),
            self.group_by.columns.join(", "),
            self.group_by.top_n,
            self.strategy.name()
        );
        self.projection.show_tree(&child_prefix(prefix));
    }
}
