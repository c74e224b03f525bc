use std::sync::Arc;

use itertools::Itertools;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::operators::ProjectionOperator;
use crate::plan::{child_prefix, ColumnarDataSourcePlanNode, DocIdSetPlanNode, PlanNode};
use crate::{Result, SharedOperator};

pub struct ProjectionPlanNode {
    doc_id_set: DocIdSetPlanNode,
    data_sources: Vec<Arc<ColumnarDataSourcePlanNode>>,
    operator: OnceCell<SharedOperator<ProjectionOperator>>,
}

impl ProjectionPlanNode {
    pub fn new(
        doc_id_set: DocIdSetPlanNode,
        data_sources: Vec<Arc<ColumnarDataSourcePlanNode>>,
    ) -> Self {
        Self {
            doc_id_set,
            data_sources,
            operator: OnceCell::new(),
        }
    }
}

impl PlanNode for ProjectionPlanNode {
    type Operator = SharedOperator<ProjectionOperator>;

    fn run(&self) -> Result<Self::Operator> {
        self.operator
            .get_or_try_init(|| -> Result<_> {
                let doc_id_set = self.doc_id_set.run()?;
                let data_sources = self
                    .data_sources
                    .iter()
                    .map(|node| node.run())
                    .try_collect()?;
                Ok(Arc::new(Mutex::new(ProjectionOperator::new(
                    doc_id_set,
                    data_sources,
                ))))
            })
            .map(Clone::clone)
    }

    fn show_tree(&self, prefix: &str) {
        tracing::debug!(
            "{}Projection(columns: [{}])",
            prefix,
            self.data_sources.iter().map(|node| node.column()).join(", ")
        );
        let prefix = child_prefix(prefix);
        self.doc_id_set.show_tree(&prefix);
        for node in &self.data_sources {
            node.show_tree(&prefix);
        }
    }
}
