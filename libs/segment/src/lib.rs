mod data_source;
mod dictionary;
mod doc_id;
mod memory;
mod schema;
mod segment;

pub use data_source::{ColumnBlock, DataSource, DataSourceRef};
pub use dictionary::{Dictionary, DictionaryRef};
pub use doc_id::{BoxDocIdSource, DocId, DocIdSource};
pub use memory::{MemorySegment, SegmentBuilder};
pub use schema::{Field, Schema, SchemaRef};
pub use segment::{IndexSegment, SegmentRef};
