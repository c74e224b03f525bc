#[macro_use]
mod error;

mod aggregation;
mod block;
mod config;
mod group_by;
mod operator;

pub mod operators;
pub mod plan;
pub mod transfer;

pub use aggregation::Accumulator;
pub use block::{ExceptionKind, ProcessingException, ResultBlock, SelectionResult};
pub use config::{ExecutionConfig, ExecutionConfigRef, ParallelismPolicy};
pub use error::{Error, Result};
pub use group_by::{
    BoxGroupByAccumulator, GroupByAccumulator, GroupByResult, GroupKey, HashGroupBy, TrieGroupBy,
};
pub use operator::{BlockOperatorRef, CancelFlag, Operator, SharedOperator};
