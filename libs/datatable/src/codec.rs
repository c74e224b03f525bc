use std::collections::BTreeMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use quarry_array::Scalar;

use crate::{Cell, ColumnKind, ColumnSchema, DataTable, DecodeError};

const MAGIC: &[u8; 4] = b"QDT1";
const VERSION: u16 = 1;

const TAG_NULL: u8 = 0;
const TAG_BOOLEAN: u8 = 1;
const TAG_INT32: u8 = 2;
const TAG_INT64: u8 = 3;
const TAG_FLOAT64: u8 = 4;
const TAG_STRING: u8 = 5;

fn put_str(buf: &mut BytesMut, s: &str) {
    buf.put_u32(s.len() as u32);
    buf.put_slice(s.as_bytes());
}

fn put_scalar(buf: &mut BytesMut, value: &Scalar) {
    match value {
        Scalar::Null => buf.put_u8(TAG_NULL),
        Scalar::Boolean(value) => {
            buf.put_u8(TAG_BOOLEAN);
            buf.put_u8(*value as u8);
        }
        Scalar::Int32(value) => {
            buf.put_u8(TAG_INT32);
            buf.put_i32(*value);
        }
        Scalar::Int64(value) => {
            buf.put_u8(TAG_INT64);
            buf.put_i64(*value);
        }
        Scalar::Float64(value) => {
            buf.put_u8(TAG_FLOAT64);
            buf.put_f64(*value);
        }
        Scalar::String(value) => {
            buf.put_u8(TAG_STRING);
            put_str(buf, value);
        }
    }
}

pub(crate) fn encode(table: &DataTable) -> Bytes {
    let mut buf = BytesMut::new();

    buf.put_slice(MAGIC);
    buf.put_u16(VERSION);
    buf.put_u32(table.num_rows() as u32);
    buf.put_u32(table.schema().len() as u32);
    buf.put_u32(table.metadata().len() as u32);

    for column in table.schema() {
        put_str(&mut buf, &column.name);
        buf.put_u8(column.kind.tag());
    }

    for (key, value) in table.metadata() {
        put_str(&mut buf, key);
        put_str(&mut buf, value);
    }

    let mut variable = BytesMut::new();
    for row in table.rows() {
        for cell in row {
            match cell {
                Cell::Int32(value) => buf.put_i32(*value),
                Cell::Int64(value) => buf.put_i64(*value),
                Cell::Float64(value) => buf.put_f64(*value),
                Cell::String(value) => {
                    buf.put_u32(variable.len() as u32);
                    buf.put_u32(value.len() as u32);
                    variable.put_slice(value.as_bytes());
                }
                Cell::ObjectArray(values) => {
                    let offset = variable.len();
                    variable.put_u32(values.len() as u32);
                    for value in values {
                        put_scalar(&mut variable, value);
                    }
                    buf.put_u32(offset as u32);
                    buf.put_u32((variable.len() - offset) as u32);
                }
            }
        }
    }

    buf.put_u32(variable.len() as u32);
    buf.put_slice(&variable);
    buf.freeze()
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn take(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], DecodeError> {
        if self.buf.len() < n {
            return Err(DecodeError::Truncated {
                context,
                needed: n,
                remaining: self.buf.len(),
            });
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn u8(&mut self, context: &'static str) -> Result<u8, DecodeError> {
        Ok(self.take(1, context)?.get_u8())
    }

    fn u16(&mut self, context: &'static str) -> Result<u16, DecodeError> {
        Ok(self.take(2, context)?.get_u16())
    }

    fn u32(&mut self, context: &'static str) -> Result<u32, DecodeError> {
        Ok(self.take(4, context)?.get_u32())
    }

    fn i32(&mut self, context: &'static str) -> Result<i32, DecodeError> {
        Ok(self.take(4, context)?.get_i32())
    }

    fn i64(&mut self, context: &'static str) -> Result<i64, DecodeError> {
        Ok(self.take(8, context)?.get_i64())
    }

    fn f64(&mut self, context: &'static str) -> Result<f64, DecodeError> {
        Ok(self.take(8, context)?.get_f64())
    }

    fn string(&mut self, context: &'static str) -> Result<String, DecodeError> {
        let len = self.u32(context)? as usize;
        utf8(self.take(len, context)?, context)
    }

    fn scalar(&mut self) -> Result<Scalar, DecodeError> {
        Ok(match self.u8("value tag")? {
            TAG_NULL => Scalar::Null,
            TAG_BOOLEAN => Scalar::Boolean(self.u8("boolean value")? != 0),
            TAG_INT32 => Scalar::Int32(self.i32("int32 value")?),
            TAG_INT64 => Scalar::Int64(self.i64("int64 value")?),
            TAG_FLOAT64 => Scalar::Float64(self.f64("float64 value")?),
            TAG_STRING => Scalar::String(self.string("string value")?.into()),
            tag => return Err(DecodeError::UnknownValueTag(tag)),
        })
    }

    fn remaining(&self) -> usize {
        self.buf.len()
    }
}

fn utf8(data: &[u8], context: &'static str) -> Result<String, DecodeError> {
    std::str::from_utf8(data)
        .map(ToString::to_string)
        .map_err(|_| DecodeError::InvalidUtf8(context))
}

fn variable_slice(variable: &[u8], offset: u32, len: u32) -> Result<&[u8], DecodeError> {
    let offset = offset as usize;
    let end = offset.checked_add(len as usize).unwrap_or(usize::MAX);
    variable.get(offset..end).ok_or(DecodeError::OutOfBounds {
        offset,
        end,
        size: variable.len(),
    })
}

fn decode_object_array(data: &[u8]) -> Result<Vec<Scalar>, DecodeError> {
    let mut reader = Reader::new(data);
    let count = reader.u32("object array length")? as usize;
    let mut values = Vec::with_capacity(count.min(reader.remaining()));
    for _ in 0..count {
        values.push(reader.scalar()?);
    }
    if reader.remaining() > 0 {
        return Err(DecodeError::TrailingBytes(reader.remaining()));
    }
    Ok(values)
}

pub(crate) fn decode(data: &[u8]) -> Result<DataTable, DecodeError> {
    let mut reader = Reader::new(data);

    if reader.take(MAGIC.len(), "magic")? != MAGIC {
        return Err(DecodeError::BadMagic);
    }
    let version = reader.u16("version")?;
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }
    let num_rows = reader.u32("row count")? as usize;
    let num_columns = reader.u32("column count")? as usize;
    let num_metadata = reader.u32("metadata count")? as usize;

    let mut schema = Vec::with_capacity(num_columns.min(reader.remaining()));
    for _ in 0..num_columns {
        let name = reader.string("column name")?;
        let kind = ColumnKind::from_tag(reader.u8("column kind")?)?;
        schema.push(ColumnSchema { name, kind });
    }

    let mut metadata = BTreeMap::new();
    for _ in 0..num_metadata {
        let key = reader.string("metadata key")?;
        let value = reader.string("metadata value")?;
        metadata.insert(key, value);
    }

    let row_width: usize = schema.iter().map(|column| column.kind.fixed_width()).sum();
    if row_width == 0 && num_rows > 0 {
        return Err(DecodeError::RowsWithoutColumns(num_rows));
    }
    // a non-zero row width bounds `num_rows` by the fixed region taken below
    let fixed_len = num_rows.checked_mul(row_width).unwrap_or(usize::MAX);
    let mut fixed = Reader::new(reader.take(fixed_len, "fixed row region")?);

    let variable_len = reader.u32("variable region length")? as usize;
    let variable = reader.take(variable_len, "variable region")?;
    if reader.remaining() > 0 {
        return Err(DecodeError::TrailingBytes(reader.remaining()));
    }

    let mut rows = Vec::with_capacity(num_rows);
    for _ in 0..num_rows {
        let mut row = Vec::with_capacity(schema.len());
        for column in &schema {
            let cell = match column.kind {
                ColumnKind::Int32 => Cell::Int32(fixed.i32("int32 cell")?),
                ColumnKind::Int64 => Cell::Int64(fixed.i64("int64 cell")?),
                ColumnKind::Float64 => Cell::Float64(fixed.f64("float64 cell")?),
                ColumnKind::String => {
                    let offset = fixed.u32("string offset")?;
                    let len = fixed.u32("string length")?;
                    Cell::String(utf8(variable_slice(variable, offset, len)?, "string cell")?)
                }
                ColumnKind::ObjectArray => {
                    let offset = fixed.u32("object array offset")?;
                    let len = fixed.u32("object array length")?;
                    Cell::ObjectArray(decode_object_array(variable_slice(
                        variable, offset, len,
                    )?)?)
                }
            };
            row.push(cell);
        }
        rows.push(row);
    }

    Ok(DataTable::from_parts(schema, rows, metadata))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group_by_table() -> DataTable {
        let mut table = DataTable::new(vec![
            ColumnSchema::new("group", ColumnKind::ObjectArray),
            ColumnSchema::new("count_star", ColumnKind::Int64),
            ColumnSchema::new("sum_clicks", ColumnKind::Float64),
            ColumnSchema::new("min_clicks", ColumnKind::ObjectArray),
            ColumnSchema::new("label", ColumnKind::String),
            ColumnSchema::new("rank", ColumnKind::Int32),
        ]);
        table
            .push_row(vec![
                Cell::ObjectArray(vec!["m".into(), Scalar::Int64(7)]),
                Cell::Int64(12),
                Cell::Float64(40.5),
                Cell::ObjectArray(vec![Scalar::Float64(1.5)]),
                Cell::String("héllo".to_string()),
                Cell::Int32(-1),
            ])
            .unwrap();
        table
            .push_row(vec![
                Cell::ObjectArray(vec![Scalar::Null, Scalar::Boolean(true)]),
                Cell::Int64(0),
                Cell::Float64(0.0),
                Cell::ObjectArray(vec![]),
                Cell::String(String::new()),
                Cell::Int32(2),
            ])
            .unwrap();
        table.set_metadata("numDocsScanned", 12);
        table.set_metadata("partial", true);
        table
    }

    #[test]
    fn test_round_trip() {
        let table = group_by_table();
        let data = table.encode();
        assert_eq!(&data[..4], b"QDT1");
        let decoded = DataTable::decode(&data).unwrap();
        assert_eq!(decoded, table);
        assert_eq!(decoded.metadata_value("numDocsScanned"), Some("12"));
        assert_eq!(
            decoded.cell(0, 0),
            Some(&Cell::ObjectArray(vec!["m".into(), Scalar::Int64(7)]))
        );
    }

    #[test]
    fn test_empty_table() {
        let table = DataTable::new(vec![ColumnSchema::new("count_star", ColumnKind::Int64)]);
        let decoded = DataTable::decode(&table.encode()).unwrap();
        assert_eq!(decoded.num_rows(), 0);
        assert_eq!(decoded.schema(), table.schema());
    }

    #[test]
    fn test_bad_magic() {
        let mut data = group_by_table().encode().to_vec();
        data[0] = b'X';
        assert_eq!(DataTable::decode(&data), Err(DecodeError::BadMagic));
    }

    #[test]
    fn test_unsupported_version() {
        let mut data = group_by_table().encode().to_vec();
        data[5] = 9;
        assert_eq!(
            DataTable::decode(&data),
            Err(DecodeError::UnsupportedVersion(9))
        );
    }

    #[test]
    fn test_truncated() {
        let data = group_by_table().encode();
        for len in [0, 3, 10, data.len() / 2, data.len() - 1].iter() {
            assert!(matches!(
                DataTable::decode(&data[..*len]),
                Err(DecodeError::Truncated { .. }) | Err(DecodeError::BadMagic)
            ));
        }
    }

    #[test]
    fn test_trailing_bytes() {
        let mut data = group_by_table().encode().to_vec();
        data.push(0);
        assert_eq!(
            DataTable::decode(&data),
            Err(DecodeError::TrailingBytes(1))
        );
    }

    #[test]
    fn test_out_of_bounds_offset() {
        let mut table = DataTable::new(vec![ColumnSchema::new("label", ColumnKind::String)]);
        table.push_row(vec![Cell::String("abc".into())]).unwrap();
        let mut data = table.encode().to_vec();
        // header (18) + schema (4 + 5 + 1) = 28, the string offset follows
        data[28..32].copy_from_slice(&100u32.to_be_bytes());
        assert!(matches!(
            DataTable::decode(&data),
            Err(DecodeError::OutOfBounds { offset: 100, .. })
        ));
    }

    fn header(num_rows: u32, num_columns: u32) -> Vec<u8> {
        let mut data = b"QDT1".to_vec();
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(&num_rows.to_be_bytes());
        data.extend_from_slice(&num_columns.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes());
        data
    }

    #[test]
    fn test_rows_without_columns() {
        let mut data = header(u32::MAX, 0);
        data.extend_from_slice(&0u32.to_be_bytes());
        assert_eq!(data.len(), 22);
        assert_eq!(
            DataTable::decode(&data),
            Err(DecodeError::RowsWithoutColumns(u32::MAX as usize))
        );
    }

    #[test]
    fn test_row_count_exceeds_fixed_region() {
        let mut data = header(u32::MAX, 1);
        data.extend_from_slice(&5u32.to_be_bytes());
        data.extend_from_slice(b"count");
        data.push(ColumnKind::Int64.tag());
        data.extend_from_slice(&0u32.to_be_bytes());
        assert!(matches!(
            DataTable::decode(&data),
            Err(DecodeError::Truncated {
                context: "fixed row region",
                ..
            })
        ));
    }
}
