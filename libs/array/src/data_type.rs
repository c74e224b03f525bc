use derive_more::Display;
use serde::{Deserialize, Serialize};

/// The sets of column data types a segment can hold.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Null type
    #[display(fmt = "null")]
    Null,

    /// A boolean type representing the values `true` and `false`.
    #[display(fmt = "boolean")]
    Boolean,

    /// A signed 32-bit integer.
    #[display(fmt = "int32")]
    Int32,

    /// A signed 64-bit integer.
    #[display(fmt = "int64")]
    Int64,

    /// A 64-bit floating point number.
    #[display(fmt = "float64")]
    Float64,

    /// A variable-length string in Unicode with UTF-8 encoding.
    #[display(fmt = "string")]
    String,
}

impl DataType {
    /// Returns `true` if this type is a numeric type (integer or float).
    #[inline]
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int32 | DataType::Int64 | DataType::Float64)
    }

    /// Returns `true` if this type is a string type.
    #[inline]
    pub fn is_string(&self) -> bool {
        matches!(self, DataType::String)
    }

    /// Returns `true` if a value of this type can be stored in a column of type `to`.
    #[inline]
    pub fn can_cast_to(&self, to: Self) -> bool {
        use DataType::*;

        if self == &to {
            return true;
        }

        match to {
            Null => matches!(self, Null),
            Boolean => matches!(self, Null | Boolean),
            Int32 => matches!(self, Null | Int32),
            Int64 => matches!(self, Null | Int32 | Int64),
            Float64 => matches!(self, Null | Int32 | Int64 | Float64),
            String => true,
        }
    }
}
