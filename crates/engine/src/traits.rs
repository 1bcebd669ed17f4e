//! Execution engine trait.

use crate::EngineError;
use async_trait::async_trait;
use meridian_types::{ChainId, Hash, Transaction, TransactionTrace};
use tokio_util::sync::CancellationToken;

/// Runs the transactions of one block.
///
/// # Contract
///
/// - Returns exactly one trace per input transaction, in input order. The
///   executor treats a count mismatch as a failed block.
/// - Intermediate state is keyed by `disambiguation`, so two executions of
///   different blocks at the same height never share writes. The executor
///   discards that state through the chain store when the block is
///   abandoned.
/// - Must return promptly with [`EngineError::Cancelled`] once `cancel`
///   fires.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Execute `transactions` in order against the state of `chain_id`.
    async fn execute(
        &self,
        transactions: &[Transaction],
        chain_id: ChainId,
        cancel: CancellationToken,
        disambiguation: Hash,
    ) -> Result<Vec<TransactionTrace>, EngineError>;
}
