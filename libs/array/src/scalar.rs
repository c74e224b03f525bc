use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::DataType;

/// A single typed value.
///
/// Floats compare and hash by their total order (`NaN == NaN`), so a `Scalar`
/// can be used directly as a hash key for group tuples and dictionaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    String(Arc<str>),
}

impl Default for Scalar {
    #[inline]
    fn default() -> Self {
        Scalar::Null
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Scalar::Null, Scalar::Null) => true,
            (Scalar::Boolean(a), Scalar::Boolean(b)) => a == b,
            (Scalar::Int32(a), Scalar::Int32(b)) => a == b,
            (Scalar::Int64(a), Scalar::Int64(b)) => a == b,
            (Scalar::Float64(a), Scalar::Float64(b)) => OrderedFloat(*a) == OrderedFloat(*b),
            (Scalar::String(a), Scalar::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Scalar {}

impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Scalar::Null => {}
            Scalar::Boolean(value) => value.hash(state),
            Scalar::Int32(value) => value.hash(state),
            Scalar::Int64(value) => value.hash(state),
            Scalar::Float64(value) => OrderedFloat(*value).hash(state),
            Scalar::String(value) => value.hash(state),
        }
    }
}

macro_rules! impl_from_numerics {
    ($(($ty:ty, $item:ident)),*) => {
        $(
        impl From<$ty> for Scalar {
            fn from(value: $ty) -> Self {
                Scalar::$item(value)
            }
        }
        )*
    };
}

impl_from_numerics!((i32, Int32), (i64, Int64), (f64, Float64));

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::String(value.into())
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.into())
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Boolean(value)
    }
}

impl From<()> for Scalar {
    fn from(_: ()) -> Self {
        Scalar::Null
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => value.into(),
            None => Scalar::Null,
        }
    }
}

impl Scalar {
    #[inline]
    pub fn data_type(&self) -> DataType {
        match self {
            Scalar::Null => DataType::Null,
            Scalar::Boolean(_) => DataType::Boolean,
            Scalar::Int32(_) => DataType::Int32,
            Scalar::Int64(_) => DataType::Int64,
            Scalar::Float64(_) => DataType::Float64,
            Scalar::String(_) => DataType::String,
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Returns the value widened to `f64`, or `None` for non-numeric values.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int32(n) => Some(*n as f64),
            Scalar::Int64(n) => Some(*n as f64),
            Scalar::Float64(n) => Some(*n),
            _ => None,
        }
    }

    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int32(n) => Some(*n as i64),
            Scalar::Int64(n) => Some(*n),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }
}

impl Display for Scalar {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => f.write_str("null"),
            Scalar::Boolean(n) => write!(f, "{}", n),
            Scalar::Int32(n) => write!(f, "{}", n),
            Scalar::Int64(n) => write!(f, "{}", n),
            Scalar::Float64(n) => write!(f, "{}", n),
            Scalar::String(n) => f.write_str(n),
        }
    }
}
