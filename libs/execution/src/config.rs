use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;

pub type ExecutionConfigRef = Arc<ExecutionConfig>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub name: String,

    /// Wall-clock budget of one combine stage.
    pub timeout_ms: u64,

    /// Maximum number of segment trees executing at the same time.
    pub max_parallelism: usize,

    /// Number of document ids pulled from a segment per batch.
    pub docs_per_batch: usize,

    /// Largest product of group column cardinalities for which the
    /// dictionary trie is used instead of hashing decoded values.
    pub trie_group_space_limit: usize,

    pub parallel: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            name: "noname".to_string(),
            timeout_ms: 15_000,
            max_parallelism: 10,
            docs_per_batch: 5_000,
            trie_group_space_limit: 1_000_000,
            parallel: true,
        }
    }
}

impl ExecutionConfig {
    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// How the combine stage runs its children.
///
/// Parallel execution needs a handle to a multi-threaded tokio runtime, and
/// the plan must then be executed from outside of that runtime's worker
/// threads.
#[derive(Debug, Clone)]
pub enum ParallelismPolicy {
    Sequential,
    Parallel(Handle),
}

impl ParallelismPolicy {
    pub(crate) fn handle(&self, config: &ExecutionConfig) -> Option<&Handle> {
        match self {
            ParallelismPolicy::Parallel(handle) if config.parallel => Some(handle),
            _ => None,
        }
    }
}
