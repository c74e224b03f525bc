//! Reduces the per-server result tables of a query into the final answer.

mod ranking;
mod reduce;
mod response;
mod server;

pub use ranking::rank_and_truncate;
pub use reduce::reduce;
pub use response::{scalar_to_json, AggregationResult, BrokerResponse, GroupValue, SelectionResults};
pub use server::ServerInstance;
