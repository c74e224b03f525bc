use std::time::Instant;

use anyhow::Result;

use crate::group_by::BoxGroupByAccumulator;
use crate::operators::ProjectionOperator;
use crate::{CancelFlag, Operator, ResultBlock, SharedOperator};

/// Aggregates the projected documents of a segment per group.
pub struct AggregationGroupByOperator {
    input: SharedOperator<ProjectionOperator>,
    group_by: Option<BoxGroupByAccumulator>,
    total_docs: u64,
    cancel: CancelFlag,
}

impl AggregationGroupByOperator {
    pub fn new(
        input: SharedOperator<ProjectionOperator>,
        group_by: BoxGroupByAccumulator,
        total_docs: u64,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            input,
            group_by: Some(group_by),
            total_docs,
            cancel,
        }
    }
}

impl Operator for AggregationGroupByOperator {
    type Output = ResultBlock;

    fn next_batch(&mut self) -> Result<Option<Self::Output>> {
        let mut group_by = match self.group_by.take() {
            Some(group_by) => group_by,
            None => return Ok(None),
        };

        let start = Instant::now();
        let mut num_docs_scanned = 0;
        let mut input = self.input.lock();

        loop {
            self.cancel.check()?;
            let block = match input.next_batch()? {
                Some(block) => block,
                None => break,
            };
            num_docs_scanned += block.len() as u64;
            group_by.aggregate(&block)?;
        }

        tracing::trace!(
            num_groups = group_by.num_groups(),
            num_docs_scanned,
            "segment group-by finished"
        );

        Ok(Some(ResultBlock {
            num_docs_scanned,
            total_docs: self.total_docs,
            time_used_ms: start.elapsed().as_millis() as u64,
            group_by_result: Some(group_by.into_result()?),
            ..Default::default()
        }))
    }
}
