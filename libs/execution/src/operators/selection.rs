use std::time::Instant;

use anyhow::{Context, Result};

use crate::block::SelectionResult;
use crate::operators::ProjectionOperator;
use crate::{CancelFlag, Operator, ResultBlock, SharedOperator};

/// Collects the values of the selected columns until `limit` rows are found.
pub struct SelectionOperator {
    input: SharedOperator<ProjectionOperator>,
    columns: Vec<String>,
    limit: usize,
    total_docs: u64,
    cancel: CancelFlag,
    finished: bool,
}

impl SelectionOperator {
    pub fn new(
        input: SharedOperator<ProjectionOperator>,
        columns: Vec<String>,
        limit: usize,
        total_docs: u64,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            input,
            columns,
            limit,
            total_docs,
            cancel,
            finished: false,
        }
    }
}

impl Operator for SelectionOperator {
    type Output = ResultBlock;

    fn next_batch(&mut self) -> Result<Option<Self::Output>> {
        if self.finished {
            return Ok(None);
        }
        self.finished = true;

        let start = Instant::now();
        let mut selection = SelectionResult::new(self.columns.clone(), self.limit);
        let mut num_docs_scanned = 0;
        let mut input = self.input.lock();

        while !selection.is_full() {
            self.cancel.check()?;
            let block = match input.next_batch()? {
                Some(block) => block,
                None => break,
            };
            num_docs_scanned += block.len() as u64;

            let columns = self
                .columns
                .iter()
                .map(|column| {
                    block
                        .column(column)
                        .with_context(|| format!("column '{}' is not projected", column))
                })
                .collect::<Result<Vec<_>>>()?;
            for row in 0..block.len() {
                if selection.is_full() {
                    break;
                }
                selection
                    .rows
                    .push(columns.iter().map(|column| column.value(row).clone()).collect());
            }
        }

        Ok(Some(ResultBlock {
            num_docs_scanned,
            total_docs: self.total_docs,
            time_used_ms: start.elapsed().as_millis() as u64,
            selection_result: Some(selection),
            ..Default::default()
        }))
    }
}
