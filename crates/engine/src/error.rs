//! Engine errors.

use thiserror::Error;

/// Errors surfaced by an [`ExecutionEngine`](crate::ExecutionEngine).
///
/// A failing transaction is not an engine error: it is reported as a failed
/// trace. These variants mean the batch as a whole produced no usable output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The cancellation token fired before the batch finished.
    #[error("execution cancelled")]
    Cancelled,

    /// The engine failed for reasons unrelated to any single transaction.
    #[error("engine failure: {0}")]
    Internal(String),
}
