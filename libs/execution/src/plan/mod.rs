//! Plan nodes and the plan maker.
//!
//! A plan node describes one operator and realizes it on `run`. Realization
//! is memoized: every call returns the same shared operator, so a node that
//! is referenced by several parents only creates its operator once.

mod aggregation;
mod combine;
mod data_source;
mod doc_id_set;
mod global;
mod maker;
mod projection;
mod selection;

use crate::Result;

pub use aggregation::{AggregationGroupByPlanNode, AggregationPlanNode, GroupByStrategy};
pub use combine::CombinePlanNode;
pub use data_source::ColumnarDataSourcePlanNode;
pub use doc_id_set::DocIdSetPlanNode;
pub use global::GlobalPlan;
pub use maker::{InnerSegmentPlan, PlanMaker};
pub use projection::ProjectionPlanNode;
pub use selection::SelectionPlanNode;

pub trait PlanNode: Send + Sync {
    type Operator;

    /// Realizes the operator of this node, or returns the one realized by an
    /// earlier call.
    fn run(&self) -> Result<Self::Operator>;

    /// Logs this node and its children at debug level.
    fn show_tree(&self, prefix: &str);
}

pub type BoxBlockPlanNode = Box<dyn PlanNode<Operator = crate::BlockOperatorRef>>;

#[inline]
fn child_prefix(prefix: &str) -> String {
    format!("{}  ", prefix)
}
