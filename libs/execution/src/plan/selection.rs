use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use quarry_request::Selection;

use crate::operators::SelectionOperator;
use crate::plan::{child_prefix, PlanNode, ProjectionPlanNode};
use crate::{BlockOperatorRef, CancelFlag, Result};

pub struct SelectionPlanNode {
    projection: Arc<ProjectionPlanNode>,
    selection: Selection,
    total_docs: u64,
    cancel: CancelFlag,
    operator: OnceCell<BlockOperatorRef>,
}

impl SelectionPlanNode {
    pub fn new(
        projection: Arc<ProjectionPlanNode>,
        selection: Selection,
        total_docs: u64,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            projection,
            selection,
            total_docs,
            cancel,
            operator: OnceCell::new(),
        }
    }
}

impl PlanNode for SelectionPlanNode {
    type Operator = BlockOperatorRef;

    fn run(&self) -> Result<Self::Operator> {
        self.operator
            .get_or_try_init(|| -> Result<BlockOperatorRef> {
                Ok(Arc::new(Mutex::new(SelectionOperator::new(
                    self.projection.run()?,
                    self.selection.columns.clone(),
                    self.selection.size,
                    self.total_docs,
                    self.cancel.clone(),
                ))))
            })
            .map(Clone::clone)
    }

    fn show_tree(&self, prefix: &str) {
        tracing::debug!(
            "{}Selection(columns: [{}], size: {})",
            prefix,
            self.selection.columns.join(", "),
            self.selection.size
        );
        self.projection.show_tree(&child_prefix(prefix));
    }
}
