use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use quarry_request::FilterQuery;
use quarry_segment::SegmentRef;

use crate::operators::DocIdSetOperator;
use crate::plan::PlanNode;
use crate::{Result, SharedOperator};

pub struct DocIdSetPlanNode {
    segment: SegmentRef,
    filter: Option<FilterQuery>,
    docs_per_batch: usize,
    operator: OnceCell<SharedOperator<DocIdSetOperator>>,
}

impl DocIdSetPlanNode {
    pub fn new(segment: SegmentRef, filter: Option<FilterQuery>, docs_per_batch: usize) -> Self {
        Self {
            segment,
            filter,
            docs_per_batch,
            operator: OnceCell::new(),
        }
    }
}

impl PlanNode for DocIdSetPlanNode {
    type Operator = SharedOperator<DocIdSetOperator>;

    fn run(&self) -> Result<Self::Operator> {
        self.operator
            .get_or_try_init(|| -> Result<_> {
                let source = self.segment.doc_id_source(self.filter.as_ref())?;
                Ok(Arc::new(Mutex::new(DocIdSetOperator::new(
                    source,
                    self.docs_per_batch,
                ))))
            })
            .map(Clone::clone)
    }

    fn show_tree(&self, prefix: &str) {
        tracing::debug!(
            "{}DocIdSet(segment: {}, filter: {:?}, docs_per_batch: {})",
            prefix,
            self.segment.name(),
            self.filter,
            self.docs_per_batch
        );
    }
}
