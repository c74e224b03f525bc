use std::time::Instant;

use anyhow::Result;
use quarry_request::AggregationInfo;

use crate::aggregation::{new_accumulators, AggregationInputs};
use crate::operators::ProjectionOperator;
use crate::{CancelFlag, Operator, ResultBlock, SharedOperator};

/// Aggregates every projected document of a segment into one accumulator
/// per function.
pub struct AggregationOperator {
    input: SharedOperator<ProjectionOperator>,
    aggregations: Vec<AggregationInfo>,
    total_docs: u64,
    cancel: CancelFlag,
    finished: bool,
}

impl AggregationOperator {
    pub fn new(
        input: SharedOperator<ProjectionOperator>,
        aggregations: Vec<AggregationInfo>,
        total_docs: u64,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            input,
            aggregations,
            total_docs,
            cancel,
            finished: false,
        }
    }
}

impl Operator for AggregationOperator {
    type Output = ResultBlock;

    fn next_batch(&mut self) -> Result<Option<Self::Output>> {
        if self.finished {
            return Ok(None);
        }
        self.finished = true;

        let start = Instant::now();
        let mut accumulators = new_accumulators(&self.aggregations);
        let mut num_docs_scanned = 0;
        let mut input = self.input.lock();

        loop {
            self.cancel.check()?;
            let block = match input.next_batch()? {
                Some(block) => block,
                None => break,
            };
            num_docs_scanned += block.len() as u64;
            let inputs = AggregationInputs::resolve(&self.aggregations, &block)?;
            for row in 0..block.len() {
                inputs.update(&mut accumulators, row);
            }
        }

        Ok(Some(ResultBlock {
            num_docs_scanned,
            total_docs: self.total_docs,
            time_used_ms: start.elapsed().as_millis() as u64,
            aggregation_result: Some(accumulators),
            ..Default::default()
        }))
    }
}
