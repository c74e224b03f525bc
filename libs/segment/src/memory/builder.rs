use std::sync::Arc;

use anyhow::Result;
use quarry_array::{DataType, Scalar};

use crate::memory::{ColumnData, MemoryColumn, MemorySegment};
use crate::{Dictionary, Field, Schema};

/// Converts `value` to the representation stored in a column of type `data_type`.
pub(crate) fn coerce(value: Scalar, data_type: DataType) -> Result<Scalar> {
    anyhow::ensure!(
        value.data_type().can_cast_to(data_type),
        "cannot store a value of type {} in a column of type {}",
        value.data_type(),
        data_type
    );
    Ok(match (value, data_type) {
        (Scalar::Null, _) => Scalar::Null,
        (Scalar::Int32(n), DataType::Int64) => Scalar::Int64(n as i64),
        (Scalar::Int32(n), DataType::Float64) => Scalar::Float64(n as f64),
        (Scalar::Int64(n), DataType::Float64) => Scalar::Float64(n as f64),
        (value, DataType::String) if !value.data_type().is_string() => {
            Scalar::String(value.to_string().into())
        }
        (value, _) => value,
    })
}

struct ColumnDef {
    field: Field,
    dictionary: Option<Dictionary>,
    ids: Vec<u32>,
    values: Vec<Scalar>,
}

/// Builds a [`MemorySegment`] row by row.
pub struct SegmentBuilder {
    name: String,
    columns: Vec<ColumnDef>,
    num_docs: usize,
}

impl SegmentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            num_docs: 0,
        }
    }

    /// Adds a dictionary encoded column.
    pub fn dictionary_column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(ColumnDef {
            field: Field::new(name, data_type),
            dictionary: Some(Dictionary::new(data_type)),
            ids: Vec::new(),
            values: Vec::new(),
        });
        self
    }

    /// Adds a column stored as plain values.
    pub fn raw_column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(ColumnDef {
            field: Field::new(name, data_type),
            dictionary: None,
            ids: Vec::new(),
            values: Vec::new(),
        });
        self
    }

    /// Appends one document; values are given in column order.
    pub fn append_row<I>(&mut self, row: I) -> Result<()>
    where
        I: IntoIterator<Item = Scalar>,
    {
        let row = row.into_iter().collect::<Vec<_>>();
        anyhow::ensure!(
            row.len() == self.columns.len(),
            "row has {} values but segment '{}' has {} columns",
            row.len(),
            self.name,
            self.columns.len()
        );

        let row = row
            .into_iter()
            .zip(&self.columns)
            .map(|(value, column)| coerce(value, column.field.data_type))
            .collect::<Result<Vec<_>>>()?;

        for (value, column) in row.into_iter().zip(&mut self.columns) {
            match &mut column.dictionary {
                Some(dictionary) => column.ids.push(dictionary.get_or_insert(value)?),
                None => column.values.push(value),
            }
        }
        self.num_docs += 1;
        Ok(())
    }

    pub fn build(self) -> Result<MemorySegment> {
        let schema = Arc::new(Schema::try_new(
            self.columns
                .iter()
                .map(|column| column.field.clone())
                .collect(),
        )?);

        let columns = self
            .columns
            .into_iter()
            .map(|column| {
                let data = match column.dictionary {
                    Some(dictionary) => ColumnData::Dictionary {
                        dictionary: Arc::new(dictionary),
                        ids: column.ids,
                    },
                    None => ColumnData::Raw(column.values),
                };
                Arc::new(MemoryColumn {
                    field: column.field,
                    data,
                })
            })
            .collect();

        Ok(MemorySegment {
            name: self.name,
            schema,
            columns,
            total_docs: self.num_docs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IndexSegment;

    #[test]
    fn test_coerce() {
        assert_eq!(
            coerce(Scalar::Int32(3), DataType::Int64).unwrap(),
            Scalar::Int64(3)
        );
        assert_eq!(
            coerce(Scalar::Int64(3), DataType::String).unwrap(),
            Scalar::from("3")
        );
        assert!(coerce(Scalar::from("x"), DataType::Float64).is_err());
        assert!(coerce(Scalar::Float64(1.5), DataType::Int64).is_err());
    }

    #[test]
    fn test_row_arity() {
        let mut builder = SegmentBuilder::new("s").raw_column("a", DataType::Int64);
        assert!(builder
            .append_row(vec![Scalar::Int64(1), Scalar::Int64(2)])
            .is_err());
        builder.append_row(vec![Scalar::Int32(1)]).unwrap();
        let segment = builder.build().unwrap();
        assert_eq!(segment.total_docs(), 1);
        assert_eq!(segment.column_names(), vec!["a".to_string()]);
    }
}
