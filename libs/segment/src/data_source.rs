use std::sync::Arc;

use anyhow::Result;
use quarry_array::{DataType, Scalar};

use crate::{DictionaryRef, DocId};

static NULL: Scalar = Scalar::Null;

/// The values of one column for a batch of documents.
#[derive(Debug, Clone)]
pub enum ColumnBlock {
    /// Dictionary ids, one per document; values are decoded on demand.
    Dictionary {
        dictionary: DictionaryRef,
        ids: Vec<u32>,
    },
    Raw(Vec<Scalar>),
}

impl ColumnBlock {
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            ColumnBlock::Dictionary { ids, .. } => ids.len(),
            ColumnBlock::Raw(values) => values.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the decoded value at position `index`.
    ///
    /// # Panics
    ///
    /// Panics if index >= len.
    #[inline]
    pub fn value(&self, index: usize) -> &Scalar {
        match self {
            ColumnBlock::Dictionary { dictionary, ids } => {
                dictionary.value(ids[index]).unwrap_or(&NULL)
            }
            ColumnBlock::Raw(values) => &values[index],
        }
    }

    /// Returns the numeric value at position `index`, `None` for nulls and
    /// non-numeric values.
    #[inline]
    pub fn numeric(&self, index: usize) -> Option<f64> {
        self.value(index).as_f64()
    }

    #[inline]
    pub fn dict_id(&self, index: usize) -> Option<u32> {
        match self {
            ColumnBlock::Dictionary { ids, .. } => Some(ids[index]),
            ColumnBlock::Raw(_) => None,
        }
    }

    #[inline]
    pub fn dictionary(&self) -> Option<&DictionaryRef> {
        match self {
            ColumnBlock::Dictionary { dictionary, .. } => Some(dictionary),
            ColumnBlock::Raw(_) => None,
        }
    }
}

/// Read access to one column of a segment.
pub trait DataSource: Send + Sync {
    fn column(&self) -> &str;

    fn data_type(&self) -> DataType;

    /// The column dictionary if the column is dictionary encoded.
    fn dictionary(&self) -> Option<DictionaryRef>;

    /// Reads the column values of the given documents, in the given order.
    fn read_block(&self, doc_ids: &[DocId]) -> Result<ColumnBlock>;
}

pub type DataSourceRef = Arc<dyn DataSource>;
