mod builder;
mod filter;

use std::sync::Arc;

use anyhow::Result;
use quarry_array::{DataType, Scalar};
use quarry_request::FilterQuery;

use crate::{
    BoxDocIdSource, ColumnBlock, DataSource, DataSourceRef, DictionaryRef, DocId, Field,
    IndexSegment, SchemaRef,
};

pub use builder::SegmentBuilder;

static NULL: Scalar = Scalar::Null;

enum ColumnData {
    Dictionary {
        dictionary: DictionaryRef,
        ids: Vec<u32>,
    },
    Raw(Vec<Scalar>),
}

pub(crate) struct MemoryColumn {
    field: Field,
    data: ColumnData,
}

impl MemoryColumn {
    #[inline]
    fn len(&self) -> usize {
        match &self.data {
            ColumnData::Dictionary { ids, .. } => ids.len(),
            ColumnData::Raw(values) => values.len(),
        }
    }

    #[inline]
    pub(crate) fn value(&self, doc_id: DocId) -> &Scalar {
        match &self.data {
            ColumnData::Dictionary { dictionary, ids } => ids
                .get(doc_id as usize)
                .and_then(|id| dictionary.value(*id))
                .unwrap_or(&NULL),
            ColumnData::Raw(values) => values.get(doc_id as usize).unwrap_or(&NULL),
        }
    }
}

impl DataSource for MemoryColumn {
    fn column(&self) -> &str {
        &self.field.name
    }

    fn data_type(&self) -> DataType {
        self.field.data_type
    }

    fn dictionary(&self) -> Option<DictionaryRef> {
        match &self.data {
            ColumnData::Dictionary { dictionary, .. } => Some(dictionary.clone()),
            ColumnData::Raw(_) => None,
        }
    }

    fn read_block(&self, doc_ids: &[DocId]) -> Result<ColumnBlock> {
        if let Some(doc_id) = doc_ids.iter().find(|doc_id| **doc_id as usize >= self.len()) {
            anyhow::bail!(
                "document {} is out of range for column '{}' with {} documents",
                doc_id,
                self.field.name,
                self.len()
            );
        }

        Ok(match &self.data {
            ColumnData::Dictionary { dictionary, ids } => ColumnBlock::Dictionary {
                dictionary: dictionary.clone(),
                ids: doc_ids.iter().map(|doc_id| ids[*doc_id as usize]).collect(),
            },
            ColumnData::Raw(values) => ColumnBlock::Raw(
                doc_ids
                    .iter()
                    .map(|doc_id| values[*doc_id as usize].clone())
                    .collect(),
            ),
        })
    }
}

/// A segment held entirely in memory, built with [`SegmentBuilder`].
pub struct MemorySegment {
    name: String,
    schema: SchemaRef,
    columns: Vec<Arc<MemoryColumn>>,
    total_docs: usize,
}

impl MemorySegment {
    pub(crate) fn column(&self, name: &str) -> Option<&Arc<MemoryColumn>> {
        self.columns.iter().find(|column| column.field.name == name)
    }
}

impl IndexSegment for MemorySegment {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn total_docs(&self) -> usize {
        self.total_docs
    }

    fn data_source(&self, column: &str) -> Option<DataSourceRef> {
        self.column(column)
            .map(|column| column.clone() as DataSourceRef)
    }

    fn doc_id_source(&self, filter: Option<&FilterQuery>) -> Result<BoxDocIdSource> {
        let predicate = match filter {
            Some(filter) => Some(filter::Predicate::compile(self, filter)?),
            None => None,
        };
        Ok(Box::new(filter::MemoryDocIdSource::new(
            predicate,
            self.total_docs as DocId,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DocIdSource;

    fn segment() -> MemorySegment {
        let mut builder = SegmentBuilder::new("people")
            .dictionary_column("gender", DataType::String)
            .raw_column("age", DataType::Int64);
        for (gender, age) in &[("m", 30i64), ("f", 25), ("m", 41), ("f", 19), ("m", 25)] {
            builder
                .append_row(vec![Scalar::from(*gender), Scalar::from(*age)])
                .unwrap();
        }
        builder.build().unwrap()
    }

    fn collect(mut source: BoxDocIdSource, max_docs: usize) -> Vec<Vec<DocId>> {
        let mut batches = Vec::new();
        loop {
            let batch = source.next_batch(max_docs).unwrap();
            if batch.is_empty() {
                return batches;
            }
            batches.push(batch);
        }
    }

    #[test]
    fn test_all_docs_in_batches() {
        let segment = segment();
        assert_eq!(
            collect(segment.doc_id_source(None).unwrap(), 2),
            vec![vec![0, 1], vec![2, 3], vec![4]]
        );
    }

    #[test]
    fn test_filtered_docs() {
        let segment = segment();
        let filter = FilterQuery::And(vec![
            FilterQuery::eq("gender", "m"),
            FilterQuery::range("age", Some(Scalar::Int32(26)), None),
        ]);
        assert_eq!(
            collect(segment.doc_id_source(Some(&filter)).unwrap(), 10),
            vec![vec![0, 2]]
        );
    }

    #[test]
    fn test_unknown_filter_column() {
        let segment = segment();
        assert!(segment
            .doc_id_source(Some(&FilterQuery::eq("country", "nl")))
            .is_err());
    }

    #[test]
    fn test_read_block() {
        let segment = segment();
        let gender = segment.data_source("gender").unwrap();
        assert!(gender.dictionary().is_some());
        let block = gender.read_block(&[1, 4]).unwrap();
        assert_eq!(block.value(0), &Scalar::from("f"));
        assert_eq!(block.value(1), &Scalar::from("m"));
        assert_eq!(block.dict_id(1), Some(0));

        let age = segment.data_source("age").unwrap();
        assert!(age.dictionary().is_none());
        let block = age.read_block(&[3]).unwrap();
        assert_eq!(block.numeric(0), Some(19.0));

        assert!(age.read_block(&[5]).is_err());
    }
}
