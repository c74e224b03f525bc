mod aggregation;
mod filter;
mod group_by;
mod request;

pub use aggregation::{AggregationInfo, AggregationType, COUNT_STAR_COLUMN};
pub use filter::FilterQuery;
pub use group_by::{GroupBy, SortOrder};
pub use request::{Request, RequestRef, Selection};
