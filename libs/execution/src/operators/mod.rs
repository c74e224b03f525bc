mod aggregation;
mod aggregation_group_by;
mod combine;
mod doc_id_set;
mod projection;
mod selection;

pub use aggregation::AggregationOperator;
pub use aggregation_group_by::AggregationGroupByOperator;
pub use combine::{CombineChild, CombineOperator};
pub use doc_id_set::DocIdSetOperator;
pub use projection::{ProjectionBlock, ProjectionOperator};
pub use selection::SelectionOperator;
