use std::sync::Arc;

use anyhow::Result;
use quarry_request::FilterQuery;

use crate::{BoxDocIdSource, DataSourceRef, SchemaRef};

/// An immutable columnar chunk of a table.
///
/// Segments are shared read-only by every operator that reads them for the
/// lifetime of a query.
pub trait IndexSegment: Send + Sync {
    fn name(&self) -> &str;

    fn schema(&self) -> SchemaRef;

    fn total_docs(&self) -> usize;

    fn column_names(&self) -> Vec<String> {
        self.schema().column_names()
    }

    fn data_source(&self, column: &str) -> Option<DataSourceRef>;

    /// Creates a source of the ids of documents matching `filter`, or of all
    /// documents when there is no filter.
    fn doc_id_source(&self, filter: Option<&FilterQuery>) -> Result<BoxDocIdSource>;
}

pub type SegmentRef = Arc<dyn IndexSegment>;
