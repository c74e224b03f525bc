use anyhow::Result;
use quarry_segment::{BoxDocIdSource, DocId};

use crate::Operator;

/// Emits the ids of matching documents in batches of at most
/// `docs_per_batch`.
pub struct DocIdSetOperator {
    source: BoxDocIdSource,
    docs_per_batch: usize,
    exhausted: bool,
}

impl DocIdSetOperator {
    pub fn new(source: BoxDocIdSource, docs_per_batch: usize) -> Self {
        Self {
            source,
            docs_per_batch: docs_per_batch.max(1),
            exhausted: false,
        }
    }
}

impl Operator for DocIdSetOperator {
    type Output = Vec<DocId>;

    fn next_batch(&mut self) -> Result<Option<Self::Output>> {
        if self.exhausted {
            return Ok(None);
        }
        let batch = self.source.next_batch(self.docs_per_batch)?;
        if batch.is_empty() {
            self.exhausted = true;
            return Ok(None);
        }
        Ok(Some(batch))
    }
}
