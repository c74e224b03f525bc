use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::ResultBlock;

/// A pull-based cursor over the output of a query stage.
///
/// `next_batch` returns `Ok(None)` once the operator is exhausted and keeps
/// doing so on further calls.
pub trait Operator: Send {
    type Output;

    fn next_batch(&mut self) -> Result<Option<Self::Output>>;
}

/// A realized operator shared between the plan node that created it and the
/// operators consuming it.
pub type SharedOperator<O> = Arc<Mutex<O>>;

pub type BlockOperatorRef = Arc<Mutex<dyn Operator<Output = ResultBlock>>>;

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    deadline: OnceCell<Instant>,
}

/// Raised by the combine stage when it stops waiting for its children, and
/// implicitly once the combine deadline has passed. Operators check it
/// between batches.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<CancelState>);

impl CancelFlag {
    #[inline]
    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::Relaxed);
    }

    /// Only the first deadline is kept.
    pub(crate) fn set_deadline(&self, deadline: Instant) {
        let _ = self.0.deadline.set(deadline);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::Relaxed)
            || self
                .0
                .deadline
                .get()
                .map_or(false, |deadline| Instant::now() >= *deadline)
    }

    pub(crate) fn check(&self) -> Result<()> {
        anyhow::ensure!(!self.is_cancelled(), "query cancelled");
        Ok(())
    }
}

/// Pulls every block of `operator` and merges them into one.
pub(crate) fn drain_blocks(operator: &BlockOperatorRef) -> Result<ResultBlock> {
    let mut operator = operator.lock();
    let mut merged: Option<ResultBlock> = None;
    while let Some(block) = operator.next_batch()? {
        merged = Some(match merged.take() {
            Some(mut merged) => {
                merged.merge(block)?;
                merged
            }
            None => block,
        });
    }
    Ok(merged.unwrap_or_default())
}
