//! Block execution outcome codes.

use std::fmt;

/// Outcome of [`BlockExecutor::execute_block`](crate::BlockExecutor::execute_block).
///
/// Codes are grouped into bands:
///
/// | Band | Meaning |
/// |---|---|
/// | `< 11` | success |
/// | `11..=50` | block not appended; may be executed again later |
/// | `51..=100` | block cannot be executed as given |
/// | `> 100` | execution failed and was rolled back |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum BlockExecutionResult {
    /// Block executed and committed.
    Success = 1,
    /// Prepare stage passed.
    PrepareSuccess = 2,
    /// CollectTransactions stage passed.
    CollectTransactionsSuccess = 3,
    /// World-state verification passed.
    UpdateWorldStateSuccess = 4,

    /// A side-chain block info entry failed the consistency check.
    InvalidSideChainInfo = 11,
    /// The indexed parent-chain block info does not match the cached one.
    InvalidParentChainBlockInfo = 12,

    /// The executor is not initialized, was cancelled, or ran out of time.
    ExecutionCancelled = 51,
    /// No block was supplied.
    BlockIsNull = 52,
    /// The block has no transactions.
    NoTransaction = 53,
    /// More than one transaction indexes parent-chain block info.
    TooManyTxsForParentChainBlock = 54,
    /// The block was not executed.
    NotExecuted = 55,
    /// The block was already received.
    AlreadyReceived = 56,
    /// The executed state does not match the header's world-state root.
    IncorrectStateMerkleTree = 57,
    /// The block is ahead of the chain.
    FutureBlock = 58,

    /// Execution failed after it started; intermediate state was rolled back.
    Failed = 101,
}

impl BlockExecutionResult {
    /// Numeric code.
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Whether the code is in the success band.
    pub fn is_success(&self) -> bool {
        self.code() < 11
    }

    /// Whether any failure band applies.
    pub fn is_failed(&self) -> bool {
        !self.is_success()
    }

    /// The block was not appended but may be retried later.
    pub fn can_execute_again(&self) -> bool {
        (11..=50).contains(&self.code())
    }

    /// The block cannot be executed as given.
    pub fn cannot_execute(&self) -> bool {
        (51..=100).contains(&self.code())
    }

    /// Execution failed after it started and needed a rollback.
    pub fn need_to_rollback(&self) -> bool {
        self.code() > 100
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::PrepareSuccess => "PrepareSuccess",
            Self::CollectTransactionsSuccess => "CollectTransactionsSuccess",
            Self::UpdateWorldStateSuccess => "UpdateWorldStateSuccess",
            Self::InvalidSideChainInfo => "InvalidSideChainInfo",
            Self::InvalidParentChainBlockInfo => "InvalidParentChainBlockInfo",
            Self::ExecutionCancelled => "ExecutionCancelled",
            Self::BlockIsNull => "BlockIsNull",
            Self::NoTransaction => "NoTransaction",
            Self::TooManyTxsForParentChainBlock => "TooManyTxsForParentChainBlock",
            Self::NotExecuted => "NotExecuted",
            Self::AlreadyReceived => "AlreadyReceived",
            Self::IncorrectStateMerkleTree => "IncorrectStateMerkleTree",
            Self::FutureBlock => "FutureBlock",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for BlockExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.code())
    }
}

/// Why a block was abandoned after execution started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCause {
    /// The executed state does not match the header's world-state root.
    StateMismatch,
    /// A cross-chain entry was rejected on commit.
    CrossChain,
    /// The engine failed, or its traces do not match the block.
    Engine,
    /// A store failed.
    Storage,
    /// Execution was cancelled or ran out of time.
    Cancelled,
}

impl FailureCause {
    /// Whether the block itself is at fault, so running it again fails the
    /// same way.
    pub fn is_block_fault(&self) -> bool {
        matches!(self, Self::StateMismatch | Self::CrossChain)
    }

    /// Label for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StateMismatch => "state_mismatch",
            Self::CrossChain => "cross_chain",
            Self::Engine => "engine",
            Self::Storage => "storage",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one block plus, for abandoned blocks, the cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Result code.
    pub result: BlockExecutionResult,
    /// Set when execution started and the block was abandoned.
    pub cause: Option<FailureCause>,
}

impl ExecutionReport {
    pub(crate) fn new(result: BlockExecutionResult) -> Self {
        Self {
            result,
            cause: None,
        }
    }

    /// Whether executing the same block again cannot succeed.
    pub fn is_final_failure(&self) -> bool {
        self.result.cannot_execute() || self.cause.is_some_and(|cause| cause.is_block_fault())
    }
}
