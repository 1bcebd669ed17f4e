//! Execution traces and per-transaction results.

use crate::{Address, BlockHeight, Hash};
use serde::{Deserialize, Serialize};

/// A log emitted by a contract during execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Emitting contract.
    pub address: Address,
    /// Indexed topics.
    pub topics: Vec<Hash>,
    /// Opaque payload.
    pub data: Vec<u8>,
}

/// A single key write produced by execution. `None` deletes the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    /// State key.
    pub key: Vec<u8>,
    /// New value, or `None` for a deletion.
    pub value: Option<Vec<u8>>,
}

/// What the execution engine reports for one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionTrace {
    /// Id of the executed transaction.
    pub transaction_id: Hash,

    /// Error text; empty when the transaction executed successfully.
    pub error: String,

    /// Value returned by the invoked method.
    pub return_value: Vec<u8>,

    /// Logs emitted during execution.
    pub logs: Vec<LogEvent>,

    /// Ordered state writes. Empty for failed executions.
    pub state_changes: Vec<StateChange>,
}

impl TransactionTrace {
    /// A successful trace.
    pub fn success(
        transaction_id: Hash,
        return_value: Vec<u8>,
        logs: Vec<LogEvent>,
        state_changes: Vec<StateChange>,
    ) -> Self {
        Self {
            transaction_id,
            error: String::new(),
            return_value,
            logs,
            state_changes,
        }
    }

    /// A failed trace. Failed executions leave no state behind.
    pub fn failure(transaction_id: Hash, error: impl Into<String>) -> Self {
        Self {
            transaction_id,
            error: error.into(),
            return_value: vec![],
            logs: vec![],
            state_changes: vec![],
        }
    }

    /// Whether execution succeeded.
    pub fn is_success(&self) -> bool {
        self.error.is_empty()
    }

    /// Hash summarizing the trace's state delta.
    ///
    /// Length-prefixed so distinct change lists never collide. A trace without
    /// changes still hashes its id, which is the "no effective delta" value
    /// that failed transactions contribute to the block's state root.
    pub fn summarized_state_hash(&self) -> Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"state-delta");
        hasher.update(self.transaction_id.as_bytes());
        for change in &self.state_changes {
            hasher.update(&(change.key.len() as u64).to_le_bytes());
            hasher.update(&change.key);
            match &change.value {
                Some(value) => {
                    hasher.update(&[1]);
                    hasher.update(&(value.len() as u64).to_le_bytes());
                    hasher.update(value);
                }
                None => {
                    hasher.update(&[0]);
                }
            }
        }
        Hash::from_hasher(hasher)
    }
}

/// Outcome of a transaction included in a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionResultStatus {
    /// Executed and its state delta applied.
    Mined,
    /// Execution failed; the ledger state is untouched.
    Failed,
}

/// Persisted result of one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResult {
    /// Id of the transaction.
    pub transaction_id: Hash,

    /// Mined or failed.
    pub status: TransactionResultStatus,

    /// Summary of the state delta, see [`TransactionTrace::summarized_state_hash`].
    pub state_hash: Hash,

    /// Logs emitted during execution.
    pub logs: Vec<LogEvent>,

    /// Return value, or the error text for failed transactions.
    pub return_value: Vec<u8>,

    /// Position of the transaction within its block.
    pub index: u32,

    /// Height of the containing block, set when persisted.
    pub block_number: BlockHeight,

    /// Hash of the containing block, set when persisted.
    pub block_hash: Hash,
}

impl TransactionResult {
    /// Convert an engine trace into the result recorded for the block.
    pub fn from_trace(trace: &TransactionTrace, index: u32) -> Self {
        let state_hash = trace.summarized_state_hash();
        if trace.is_success() {
            Self {
                transaction_id: trace.transaction_id,
                status: TransactionResultStatus::Mined,
                state_hash,
                logs: trace.logs.clone(),
                return_value: trace.return_value.clone(),
                index,
                block_number: BlockHeight::GENESIS,
                block_hash: Hash::ZERO,
            }
        } else {
            Self {
                transaction_id: trace.transaction_id,
                status: TransactionResultStatus::Failed,
                state_hash,
                logs: vec![],
                return_value: trace.error.as_bytes().to_vec(),
                index,
                block_number: BlockHeight::GENESIS,
                block_hash: Hash::ZERO,
            }
        }
    }

    /// Whether the transaction's state delta was applied.
    pub fn is_mined(&self) -> bool {
        self.status == TransactionResultStatus::Mined
    }
}
