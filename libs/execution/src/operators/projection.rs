use ahash::AHashMap;
use anyhow::Result;
use quarry_segment::{ColumnBlock, DataSourceRef, DocId};

use crate::operators::DocIdSetOperator;
use crate::{Operator, SharedOperator};

/// Values of the projected columns for one batch of documents.
#[derive(Debug, Clone)]
pub struct ProjectionBlock {
    doc_ids: Vec<DocId>,
    columns: AHashMap<String, ColumnBlock>,
}

impl ProjectionBlock {
    pub fn new(doc_ids: Vec<DocId>, columns: AHashMap<String, ColumnBlock>) -> Self {
        Self { doc_ids, columns }
    }

    #[inline]
    pub fn doc_ids(&self) -> &[DocId] {
        &self.doc_ids
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.doc_ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    #[inline]
    pub fn column(&self, name: &str) -> Option<&ColumnBlock> {
        self.columns.get(name)
    }
}

pub struct ProjectionOperator {
    input: SharedOperator<DocIdSetOperator>,
    data_sources: Vec<DataSourceRef>,
}

impl ProjectionOperator {
    pub fn new(input: SharedOperator<DocIdSetOperator>, data_sources: Vec<DataSourceRef>) -> Self {
        Self {
            input,
            data_sources,
        }
    }
}

impl Operator for ProjectionOperator {
    type Output = ProjectionBlock;

    fn next_batch(&mut self) -> Result<Option<Self::Output>> {
        let doc_ids = match self.input.lock().next_batch()? {
            Some(doc_ids) => doc_ids,
            None => return Ok(None),
        };

        let mut columns = AHashMap::with_capacity(self.data_sources.len());
        for data_source in &self.data_sources {
            columns.insert(
                data_source.column().to_string(),
                data_source.read_block(&doc_ids)?,
            );
        }
        Ok(Some(ProjectionBlock::new(doc_ids, columns)))
    }
}
