use anyhow::Result;

/// Position of a document inside one segment.
pub type DocId = u32;

/// Produces the ids of the documents matching a predicate, in increasing order.
pub trait DocIdSource: Send {
    /// Returns up to `max_docs` further matching ids. An empty batch means the
    /// source is exhausted.
    fn next_batch(&mut self, max_docs: usize) -> Result<Vec<DocId>>;
}

pub type BoxDocIdSource = Box<dyn DocIdSource>;
