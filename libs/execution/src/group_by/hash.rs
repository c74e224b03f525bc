use anyhow::{Context, Result};
use quarry_request::AggregationInfo;

use crate::aggregation::AggregationInputs;
use crate::group_by::{GroupByAccumulator, GroupByResult, GroupKey};
use crate::operators::ProjectionBlock;

/// Group-by keyed by the decoded values of the group columns.
pub struct HashGroupBy {
    columns: Vec<String>,
    aggregations: Vec<AggregationInfo>,
    result: GroupByResult,
}

impl HashGroupBy {
    pub fn new(columns: Vec<String>, aggregations: Vec<AggregationInfo>) -> Self {
        Self {
            columns,
            aggregations,
            result: GroupByResult::default(),
        }
    }
}

impl GroupByAccumulator for HashGroupBy {
    fn aggregate(&mut self, block: &ProjectionBlock) -> Result<()> {
        let group_columns = self
            .columns
            .iter()
            .map(|column| {
                block
                    .column(column)
                    .with_context(|| format!("group column '{}' is not projected", column))
            })
            .collect::<Result<Vec<_>>>()?;
        let inputs = AggregationInputs::resolve(&self.aggregations, block)?;

        for row in 0..block.len() {
            let key = group_columns
                .iter()
                .map(|column| column.value(row).clone())
                .collect::<GroupKey>();
            let accumulators = self.result.accumulators_mut(key, &self.aggregations);
            inputs.update(accumulators, row);
        }
        Ok(())
    }

    fn num_groups(&self) -> usize {
        self.result.len()
    }

    fn into_result(self: Box<Self>) -> Result<GroupByResult> {
        Ok(self.result)
    }
}
