//! Failures after execution has started.

use crate::{BlockExecutionResult, FailureCause};
use meridian_engine::EngineError;
use meridian_storage::StorageError;
use meridian_types::{BlockHeight, ChainId, Hash};
use std::time::Duration;
use thiserror::Error;

/// Why stages 3-5 of the pipeline abandoned a block.
///
/// Never leaves the crate: every variant is logged, triggers a rollback and
/// maps to a [`BlockExecutionResult`].
#[derive(Debug, Error)]
pub(crate) enum StageError {
    #[error("execution cancelled")]
    Cancelled,

    #[error("execution exceeded {0:?}")]
    TimedOut(Duration),

    #[error("engine failed: {0}")]
    Engine(EngineError),

    #[error("engine returned no trace for transaction {0}")]
    MissingTrace(Hash),

    #[error("engine returned a trace for unknown transaction {0}")]
    UnexpectedTrace(Hash),

    #[error("incorrect state merkle tree: computed {computed}, declared {declared}")]
    IncorrectStateMerkleTree { computed: Hash, declared: Hash },

    #[error("side chain {chain_id} block {height} rejected on commit")]
    SideChainUpdateRejected { chain_id: ChainId, height: BlockHeight },

    #[error("parent chain block {0} rejected on commit")]
    ParentChainUpdateRejected(BlockHeight),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<EngineError> for StageError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Cancelled => StageError::Cancelled,
            other => StageError::Engine(other),
        }
    }
}

impl StageError {
    /// The result reported for a block abandoned with this error.
    pub(crate) fn outcome(&self) -> BlockExecutionResult {
        match self {
            StageError::Cancelled | StageError::TimedOut(_) => {
                BlockExecutionResult::ExecutionCancelled
            }
            _ => BlockExecutionResult::Failed,
        }
    }

    pub(crate) fn cause(&self) -> FailureCause {
        match self {
            StageError::Cancelled | StageError::TimedOut(_) => FailureCause::Cancelled,
            StageError::Engine(_) | StageError::MissingTrace(_) | StageError::UnexpectedTrace(_) => {
                FailureCause::Engine
            }
            StageError::IncorrectStateMerkleTree { .. } => FailureCause::StateMismatch,
            StageError::SideChainUpdateRejected { .. } | StageError::ParentChainUpdateRejected(_) => {
                FailureCause::CrossChain
            }
            StageError::Storage(_) => FailureCause::Storage,
        }
    }
}
