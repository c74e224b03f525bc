use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use futures_util::stream::{FuturesUnordered, StreamExt};
use itertools::Itertools;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;

use crate::block::{ExceptionKind, ProcessingException};
use crate::config::{ExecutionConfigRef, ParallelismPolicy};
use crate::operator::drain_blocks;
use crate::{BlockOperatorRef, CancelFlag, Operator, ResultBlock};

/// One input of the combine stage, usually the plan of one segment.
pub struct CombineChild {
    pub name: String,
    pub operator: BlockOperatorRef,
}

/// Fold state of one combine invocation.
#[derive(Default)]
struct CombineContext {
    merged: ResultBlock,
    num_succeeded: usize,
    num_failed: usize,
}

fn fold(ctx: &mut CombineContext, child: &str, outcome: Result<ResultBlock>) {
    let outcome = outcome.and_then(|block| ctx.merged.merge(block));
    match outcome {
        Ok(()) => ctx.num_succeeded += 1,
        Err(err) => {
            tracing::warn!(child = %child, error = %err, "combine child failed");
            ctx.num_failed += 1;
            ctx.merged.exceptions.push(ProcessingException::new(
                ExceptionKind::Execution,
                child,
                format!("{:#}", err),
            ));
        }
    }
}

/// Runs the children one after another; returns the ones that did not finish
/// before the deadline. Their outcome is discarded.
fn run_sequential(
    children: Vec<CombineChild>,
    deadline: Instant,
    ctx: &mut CombineContext,
) -> Vec<String> {
    let mut unfinished = Vec::new();
    for child in children {
        if Instant::now() >= deadline {
            unfinished.push(child.name);
            continue;
        }
        let outcome = drain_blocks(&child.operator);
        if Instant::now() >= deadline {
            unfinished.push(child.name);
            continue;
        }
        fold(ctx, &child.name, outcome);
    }
    unfinished
}

async fn run_child(
    operator: BlockOperatorRef,
    semaphore: Arc<Semaphore>,
    cancel: CancelFlag,
) -> Result<ResultBlock> {
    let permit = semaphore.acquire_owned().await?;
    tokio::task::spawn_blocking(move || {
        let _permit = permit;
        cancel.check()?;
        drain_blocks(&operator)
    })
    .await?
}

/// Runs the children on the blocking pool of `handle`, at most
/// `max_parallelism` at a time; returns the ones still running at the
/// deadline.
///
/// Blocks the calling thread, which must not be a runtime worker.
fn run_parallel(
    handle: &Handle,
    children: Vec<CombineChild>,
    deadline: Instant,
    max_parallelism: usize,
    cancel: &CancelFlag,
    ctx: &mut CombineContext,
) -> Result<Vec<String>> {
    anyhow::ensure!(
        Handle::try_current().is_err(),
        "parallel combine cannot run inside an asynchronous task"
    );

    let semaphore = Arc::new(Semaphore::new(max_parallelism.max(1)));
    let mut names = Vec::with_capacity(children.len());
    let mut pending = FuturesUnordered::new();

    for (index, child) in children.into_iter().enumerate() {
        names.push(child.name);
        let task = run_child(child.operator, semaphore.clone(), cancel.clone());
        pending.push(async move { (index, task.await) });
    }

    let mut finished = vec![false; names.len()];
    handle.block_on(async {
        let timeout = tokio::time::Instant::from_std(deadline);
        loop {
            match tokio::time::timeout_at(timeout, pending.next()).await {
                // a child that saw the deadline reports the cancellation
                Ok(Some(_)) if Instant::now() >= deadline => break,
                Ok(Some((index, outcome))) => {
                    finished[index] = true;
                    fold(ctx, &names[index], outcome);
                }
                Ok(None) | Err(_) => break,
            }
        }
    });

    Ok(names
        .into_iter()
        .zip(finished)
        .filter(|(_, finished)| !finished)
        .map(|(name, _)| name)
        .collect())
}

/// Executes several operator trees and merges their results into one block,
/// bounded by the configured timeout.
///
/// Children still running at the deadline are abandoned: the cancel flag is
/// raised for them and the merged block is marked partial. A failing child
/// is reported as an exception; the stage only fails when every child does.
pub struct CombineOperator {
    children: Vec<CombineChild>,
    config: ExecutionConfigRef,
    policy: ParallelismPolicy,
    cancel: CancelFlag,
    finished: bool,
}

impl CombineOperator {
    pub fn new(
        children: Vec<CombineChild>,
        config: ExecutionConfigRef,
        policy: ParallelismPolicy,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            children,
            config,
            policy,
            cancel,
            finished: false,
        }
    }
}

impl Operator for CombineOperator {
    type Output = ResultBlock;

    fn next_batch(&mut self) -> Result<Option<Self::Output>> {
        if self.finished {
            return Ok(None);
        }
        self.finished = true;

        let start = Instant::now();
        let deadline = start + self.config.timeout();
        self.cancel.set_deadline(deadline);
        let children = std::mem::take(&mut self.children);
        let num_children = children.len();
        let mut ctx = CombineContext::default();

        let unfinished = match self.policy.handle(&self.config) {
            Some(handle) => run_parallel(
                handle,
                children,
                deadline,
                self.config.max_parallelism,
                &self.cancel,
                &mut ctx,
            )?,
            None => run_sequential(children, deadline, &mut ctx),
        };

        if !unfinished.is_empty() {
            self.cancel.cancel();
            tracing::warn!(
                name = %self.config.name,
                num_unfinished = unfinished.len(),
                timeout_ms = self.config.timeout_ms,
                "combine timed out"
            );
            ctx.merged.partial = true;
            ctx.merged.num_unfinished += unfinished.len();
            ctx.merged.exceptions.push(ProcessingException::new(
                ExceptionKind::Timeout,
                self.config.name.clone(),
                format!(
                    "{} of {} segments did not finish within {}ms: {}",
                    unfinished.len(),
                    num_children,
                    self.config.timeout_ms,
                    unfinished.iter().join(", ")
                ),
            ));
        }

        if num_children > 0 && ctx.num_failed == num_children {
            anyhow::bail!(
                "all {} segments failed: {}",
                num_children,
                ctx.merged
                    .exceptions
                    .iter()
                    .map(|exception| format!("{}: {}", exception.source, exception.message))
                    .join("; ")
            );
        }

        ctx.merged.time_used_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            name = %self.config.name,
            num_children,
            num_succeeded = ctx.num_succeeded,
            num_failed = ctx.num_failed,
            num_unfinished = unfinished.len(),
            time_used_ms = ctx.merged.time_used_ms,
            "combine finished"
        );
        Ok(Some(ctx.merged))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parking_lot::Mutex;
    use tokio::runtime::Runtime;

    use super::*;
    use crate::aggregation::Accumulator;
    use crate::config::ExecutionConfig;

    struct TestOperator {
        count: u64,
        delay: Duration,
        fail: bool,
        cancel: CancelFlag,
        finished: bool,
    }

    impl Operator for TestOperator {
        type Output = ResultBlock;

        fn next_batch(&mut self) -> Result<Option<ResultBlock>> {
            if self.finished {
                return Ok(None);
            }
            self.finished = true;

            let start = Instant::now();
            while start.elapsed() < self.delay {
                self.cancel.check()?;
                std::thread::sleep(Duration::from_millis(5));
            }
            anyhow::ensure!(!self.fail, "disk on fire");
            Ok(Some(ResultBlock {
                num_docs_scanned: self.count,
                total_docs: self.count,
                aggregation_result: Some(vec![Accumulator::Count(self.count)]),
                ..Default::default()
            }))
        }
    }

    fn child(
        name: &str,
        count: u64,
        delay_ms: u64,
        fail: bool,
        cancel: &CancelFlag,
    ) -> CombineChild {
        CombineChild {
            name: name.to_string(),
            operator: Arc::new(Mutex::new(TestOperator {
                count,
                delay: Duration::from_millis(delay_ms),
                fail,
                cancel: cancel.clone(),
                finished: false,
            })),
        }
    }

    fn config(timeout_ms: u64, max_parallelism: usize) -> ExecutionConfigRef {
        Arc::new(ExecutionConfig {
            name: "test".to_string(),
            timeout_ms,
            max_parallelism,
            ..Default::default()
        })
    }

    fn runtime() -> Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap()
    }

    fn run(operator: &mut CombineOperator) -> Result<ResultBlock> {
        let block = operator.next_batch()?.unwrap();
        assert!(operator.next_batch()?.is_none());
        Ok(block)
    }

    #[test]
    fn test_sequential() {
        let cancel = CancelFlag::default();
        let mut operator = CombineOperator::new(
            vec![
                child("s0", 3, 0, false, &cancel),
                child("s1", 4, 0, false, &cancel),
                child("s2", 5, 0, false, &cancel),
            ],
            config(10_000, 4),
            ParallelismPolicy::Sequential,
            cancel,
        );
        let block = run(&mut operator).unwrap();
        assert_eq!(block.num_docs_scanned, 12);
        assert_eq!(block.aggregation_result, Some(vec![Accumulator::Count(12)]));
        assert!(!block.partial);
        assert!(block.exceptions.is_empty());
    }

    #[test]
    fn test_parallel_bounded() {
        let runtime = runtime();
        let cancel = CancelFlag::default();
        let children = (0..8)
            .map(|i| child(&format!("s{}", i), i + 1, 20, false, &cancel))
            .collect();
        let mut operator = CombineOperator::new(
            children,
            config(10_000, 1),
            ParallelismPolicy::Parallel(runtime.handle().clone()),
            cancel,
        );
        let block = run(&mut operator).unwrap();
        assert_eq!(block.aggregation_result, Some(vec![Accumulator::Count(36)]));
        assert!(!block.partial);
    }

    #[test]
    fn test_timeout_is_partial() {
        let runtime = runtime();
        let cancel = CancelFlag::default();
        let mut operator = CombineOperator::new(
            vec![
                child("fast0", 10, 0, false, &cancel),
                child("slow0", 100, 10_000, false, &cancel),
                child("fast1", 20, 0, false, &cancel),
                child("slow1", 100, 10_000, false, &cancel),
            ],
            config(300, 4),
            ParallelismPolicy::Parallel(runtime.handle().clone()),
            cancel.clone(),
        );

        let start = Instant::now();
        let block = run(&mut operator).unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));

        assert!(block.partial);
        assert_eq!(block.num_unfinished, 2);
        assert_eq!(block.num_docs_scanned, 30);
        assert_eq!(block.aggregation_result, Some(vec![Accumulator::Count(30)]));
        assert_eq!(block.exceptions.len(), 1);
        assert_eq!(block.exceptions[0].kind, ExceptionKind::Timeout);
        assert!(block.exceptions[0].message.contains("slow0"));
        assert!(block.exceptions[0].message.contains("slow1"));
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn test_sequential_timeout_is_partial() {
        let cancel = CancelFlag::default();
        let mut operator = CombineOperator::new(
            vec![
                child("fast", 10, 0, false, &cancel),
                child("slow", 100, 600, false, &cancel),
                child("late", 5, 0, false, &cancel),
            ],
            config(100, 4),
            ParallelismPolicy::Sequential,
            cancel.clone(),
        );

        let start = Instant::now();
        let block = run(&mut operator).unwrap();
        assert!(start.elapsed() < Duration::from_millis(500));

        assert!(block.partial);
        assert_eq!(block.num_unfinished, 2);
        assert_eq!(block.aggregation_result, Some(vec![Accumulator::Count(10)]));
        assert_eq!(block.exceptions.len(), 1);
        assert_eq!(block.exceptions[0].kind, ExceptionKind::Timeout);
        assert!(block.exceptions[0].message.contains("slow"));
        assert!(block.exceptions[0].message.contains("late"));
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn test_parallel_inside_runtime() {
        let runtime = runtime();
        let cancel = CancelFlag::default();
        let mut operator = CombineOperator::new(
            vec![child("s0", 1, 0, false, &cancel)],
            config(10_000, 4),
            ParallelismPolicy::Parallel(runtime.handle().clone()),
            cancel,
        );
        let err = runtime
            .block_on(async move { operator.next_batch() })
            .unwrap_err();
        assert!(err.to_string().contains("inside an asynchronous task"));
    }

    #[test]
    fn test_child_failure_is_a_warning() {
        let runtime = runtime();
        let cancel = CancelFlag::default();
        let mut operator = CombineOperator::new(
            vec![
                child("ok", 7, 0, false, &cancel),
                child("broken", 1, 0, true, &cancel),
            ],
            config(10_000, 4),
            ParallelismPolicy::Parallel(runtime.handle().clone()),
            cancel,
        );
        let block = run(&mut operator).unwrap();
        assert!(!block.partial);
        assert_eq!(block.aggregation_result, Some(vec![Accumulator::Count(7)]));
        assert_eq!(
            block.exceptions,
            vec![ProcessingException::new(
                ExceptionKind::Execution,
                "broken",
                "disk on fire"
            )]
        );
    }

    #[test]
    fn test_all_children_failed() {
        let cancel = CancelFlag::default();
        let mut operator = CombineOperator::new(
            vec![
                child("a", 1, 0, true, &cancel),
                child("b", 1, 0, true, &cancel),
            ],
            config(10_000, 4),
            ParallelismPolicy::Sequential,
            cancel,
        );
        let err = operator.next_batch().unwrap_err();
        assert!(err.to_string().starts_with("all 2 segments failed"));
    }

    #[test]
    fn test_no_children() {
        let mut operator = CombineOperator::new(
            Vec::new(),
            config(10_000, 4),
            ParallelismPolicy::Sequential,
            CancelFlag::default(),
        );
        let block = run(&mut operator).unwrap();
        assert_eq!(block.num_docs_scanned, 0);
        assert!(block.aggregation_result.is_none());
        assert!(!block.partial);
    }
}
