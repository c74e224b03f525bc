use thiserror::Error;

/// Reasons a byte buffer is not a valid [`DataTable`](crate::DataTable).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid magic number")]
    BadMagic,

    #[error("unsupported data table version: {0}")]
    UnsupportedVersion(u16),

    #[error("unexpected end of data: {context} needs {needed} bytes but {remaining} remain")]
    Truncated {
        context: &'static str,
        needed: usize,
        remaining: usize,
    },

    #[error("unknown column kind tag: {0}")]
    UnknownColumnKind(u8),

    #[error("unknown value tag: {0}")]
    UnknownValueTag(u8),

    #[error("invalid utf-8 in {0}")]
    InvalidUtf8(&'static str),

    #[error("variable region slice {offset}..{end} is out of bounds (size {size})")]
    OutOfBounds { offset: usize, end: usize, size: usize },

    #[error("{0} rows declared for a table without columns")]
    RowsWithoutColumns(usize),

    #[error("{0} trailing bytes after data table")]
    TrailingBytes(usize),
}
