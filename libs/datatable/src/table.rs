use std::collections::BTreeMap;

use bytes::Bytes;
use derive_more::Display;
use quarry_array::Scalar;

use crate::codec;
use crate::DecodeError;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Display)]
pub enum ColumnKind {
    #[display(fmt = "int32")]
    Int32,
    #[display(fmt = "int64")]
    Int64,
    #[display(fmt = "float64")]
    Float64,
    #[display(fmt = "string")]
    String,
    /// A list of scalars of any type, including nulls.
    #[display(fmt = "object_array")]
    ObjectArray,
}

impl ColumnKind {
    pub(crate) fn tag(&self) -> u8 {
        match self {
            ColumnKind::Int32 => 1,
            ColumnKind::Int64 => 2,
            ColumnKind::Float64 => 3,
            ColumnKind::String => 4,
            ColumnKind::ObjectArray => 5,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Result<Self, DecodeError> {
        Ok(match tag {
            1 => ColumnKind::Int32,
            2 => ColumnKind::Int64,
            3 => ColumnKind::Float64,
            4 => ColumnKind::String,
            5 => ColumnKind::ObjectArray,
            _ => return Err(DecodeError::UnknownColumnKind(tag)),
        })
    }

    /// Width of a cell of this kind in the fixed row region.
    #[inline]
    pub(crate) fn fixed_width(&self) -> usize {
        match self {
            ColumnKind::Int32 => 4,
            _ => 8,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ColumnSchema {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Int32(i32),
    Int64(i64),
    Float64(f64),
    String(String),
    ObjectArray(Vec<Scalar>),
}

impl Cell {
    #[inline]
    pub fn kind(&self) -> ColumnKind {
        match self {
            Cell::Int32(_) => ColumnKind::Int32,
            Cell::Int64(_) => ColumnKind::Int64,
            Cell::Float64(_) => ColumnKind::Float64,
            Cell::String(_) => ColumnKind::String,
            Cell::ObjectArray(_) => ColumnKind::ObjectArray,
        }
    }

    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Int32(n) => Some(*n as i64),
            Cell::Int64(n) => Some(*n),
            _ => None,
        }
    }

    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int32(n) => Some(*n as f64),
            Cell::Int64(n) => Some(*n as f64),
            Cell::Float64(n) => Some(*n),
            _ => None,
        }
    }

    #[inline]
    pub fn as_object_array(&self) -> Option<&[Scalar]> {
        match self {
            Cell::ObjectArray(values) => Some(values),
            _ => None,
        }
    }
}

/// Rows of typed cells plus a string metadata map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    schema: Vec<ColumnSchema>,
    rows: Vec<Vec<Cell>>,
    metadata: BTreeMap<String, String>,
}

impl DataTable {
    pub fn new(schema: Vec<ColumnSchema>) -> Self {
        Self {
            schema,
            rows: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub(crate) fn from_parts(
        schema: Vec<ColumnSchema>,
        rows: Vec<Vec<Cell>>,
        metadata: BTreeMap<String, String>,
    ) -> Self {
        Self {
            schema,
            rows,
            metadata,
        }
    }

    #[inline]
    pub fn schema(&self) -> &[ColumnSchema] {
        &self.schema
    }

    /// Returns the index of the column named `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.schema.iter().position(|column| column.name == name)
    }

    #[inline]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    #[inline]
    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|row| row.get(column))
    }

    /// Appends a row; its cells must match the schema kinds in order.
    pub fn push_row(&mut self, row: Vec<Cell>) -> anyhow::Result<()> {
        anyhow::ensure!(
            row.len() == self.schema.len(),
            "row has {} cells but the table has {} columns",
            row.len(),
            self.schema.len()
        );
        for (cell, column) in row.iter().zip(&self.schema) {
            anyhow::ensure!(
                cell.kind() == column.kind,
                "column '{}' expects {} but got {}",
                column.name,
                column.kind,
                cell.kind()
            );
        }
        self.rows.push(row);
        Ok(())
    }

    #[inline]
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    #[inline]
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl ToString) {
        self.metadata.insert(key.into(), value.to_string());
    }

    pub fn encode(&self) -> Bytes {
        codec::encode(self)
    }

    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        codec::decode(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_row_checks_kinds() {
        let mut table = DataTable::new(vec![
            ColumnSchema::new("group", ColumnKind::ObjectArray),
            ColumnSchema::new("count_star", ColumnKind::Int64),
        ]);
        assert!(table
            .push_row(vec![Cell::ObjectArray(vec![]), Cell::Int64(1)])
            .is_ok());
        assert!(table
            .push_row(vec![Cell::ObjectArray(vec![]), Cell::Float64(1.0)])
            .is_err());
        assert!(table.push_row(vec![Cell::Int64(1)]).is_err());
        assert_eq!(table.num_rows(), 1);
        assert_eq!(table.column_index("count_star"), Some(1));
    }
}
