//! Self-describing binary table used to ship intermediate results between
//! nodes.
//!
//! ```text
//! header    magic "QDT1" | version u16 | rows u32 | columns u32 | metadata u32
//! schema    (name, kind u8) * columns
//! metadata  (key, value) * metadata
//! fixed     rows * row width
//! variable  length u32 | bytes
//! ```
//!
//! All integers are big-endian and strings are a `u32` length followed by
//! UTF-8 bytes. Int32 cells take 4 bytes of the fixed region, Int64 and
//! Float64 cells take 8, String and ObjectArray cells take an `(offset u32,
//! length u32)` pair pointing into the variable region.

mod codec;
mod error;
mod table;

pub use error::DecodeError;
pub use table::{Cell, ColumnKind, ColumnSchema, DataTable};
