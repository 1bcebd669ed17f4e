//! Executor configuration.

use serde::Deserialize;
use std::time::Duration;

/// Block executor configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExecutorConfig {
    /// Upper bound on the engine call for one block, in milliseconds.
    ///
    /// When exceeded the block's cancellation token fires, any partial state
    /// is rolled back and the block resolves to `ExecutionCancelled`. `None`
    /// waits indefinitely.
    #[serde(default)]
    pub execution_timeout_ms: Option<u64>,
}

impl ExecutorConfig {
    /// The execution deadline, if one is configured.
    pub fn execution_timeout(&self) -> Option<Duration> {
        self.execution_timeout_ms.map(Duration::from_millis)
    }
}
