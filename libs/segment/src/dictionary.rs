use std::convert::TryFrom;
use std::sync::Arc;

use ahash::AHashMap;
use anyhow::Result;
use quarry_array::{DataType, Scalar};

pub type DictionaryRef = Arc<Dictionary>;

/// Bijection between the distinct values of one segment column and dense ids
/// `0..len`. Ids are assigned in first-seen order and never change once the
/// segment is loaded.
#[derive(Debug)]
pub struct Dictionary {
    data_type: DataType,
    values: Vec<Scalar>,
    ids: AHashMap<Scalar, u32>,
}

impl Dictionary {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            values: Vec::new(),
            ids: AHashMap::new(),
        }
    }

    pub fn from_values<I>(data_type: DataType, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = Scalar>,
    {
        let mut dictionary = Self::new(data_type);
        for value in values {
            dictionary.get_or_insert(value)?;
        }
        Ok(dictionary)
    }

    /// Returns the id of `value`, assigning the next free id if it is new.
    /// Only used while a segment is being built.
    pub(crate) fn get_or_insert(&mut self, value: Scalar) -> Result<u32> {
        anyhow::ensure!(
            value.is_null() || value.data_type() == self.data_type,
            "dictionary of type {} cannot hold a value of type {}",
            self.data_type,
            value.data_type()
        );

        if let Some(id) = self.ids.get(&value) {
            return Ok(*id);
        }
        let id = u32::try_from(self.values.len())?;
        self.values.push(value.clone());
        self.ids.insert(value, id);
        Ok(id)
    }

    #[inline]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    #[inline]
    pub fn id_of(&self, value: &Scalar) -> Option<u32> {
        self.ids.get(value).copied()
    }

    #[inline]
    pub fn value(&self, id: u32) -> Option<&Scalar> {
        self.values.get(id as usize)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
