use quarry_datatable::DecodeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The request cannot be compiled against the segments.
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    #[error("execution failed: {0}")]
    Execution(#[from] anyhow::Error),

    #[error("failed to decode data table: {0}")]
    Decode(#[from] DecodeError),

    /// A decoded table does not have the shape the request implies.
    #[error("malformed result table: {0}")]
    MalformedTable(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

macro_rules! invalid_plan {
    ($($arg:tt)*) => {
        return Err($crate::Error::InvalidPlan(format!($($arg)*)))
    };
}

macro_rules! malformed_table {
    ($($arg:tt)*) => {
        $crate::Error::MalformedTable(format!($($arg)*))
    };
}
