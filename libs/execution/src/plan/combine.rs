use std::sync::Arc;

use itertools::Itertools;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::config::{ExecutionConfigRef, ParallelismPolicy};
use crate::operators::{CombineChild, CombineOperator};
use crate::plan::{child_prefix, InnerSegmentPlan, PlanNode};
use crate::{BlockOperatorRef, CancelFlag, Result};

pub struct CombinePlanNode {
    children: Vec<InnerSegmentPlan>,
    config: ExecutionConfigRef,
    policy: ParallelismPolicy,
    cancel: CancelFlag,
    operator: OnceCell<BlockOperatorRef>,
}

impl CombinePlanNode {
    pub fn new(
        children: Vec<InnerSegmentPlan>,
        config: ExecutionConfigRef,
        policy: ParallelismPolicy,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            children,
            config,
            policy,
            cancel,
            operator: OnceCell::new(),
        }
    }

    #[inline]
    pub fn num_children(&self) -> usize {
        self.children.len()
    }
}

impl PlanNode for CombinePlanNode {
    type Operator = BlockOperatorRef;

    fn run(&self) -> Result<Self::Operator> {
        self.operator
            .get_or_try_init(|| -> Result<BlockOperatorRef> {
                let children = self
                    .children
                    .iter()
                    .map(|child| -> Result<CombineChild> {
                        Ok(CombineChild {
                            name: child.segment_name().to_string(),
                            operator: child.run()?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Arc::new(Mutex::new(CombineOperator::new(
                    children,
                    self.config.clone(),
                    self.policy.clone(),
                    self.cancel.clone(),
                ))))
            })
            .map(Clone::clone)
    }

    fn show_tree(&self, prefix: &str) {
        tracing::debug!(
            "{}Combine(segments: [{}], timeout_ms: {}, parallel: {})",
            prefix,
            self.children.iter().map(|child| child.segment_name()).join(", "),
            self.config.timeout_ms,
            self.policy.handle(&self.config).is_some()
        );
        let prefix = child_prefix(prefix);
        for child in &self.children {
            child.show_tree(&prefix);
        }
    }
}
