mod data_type;
mod scalar;

pub use data_type::DataType;
pub use scalar::Scalar;
