//! A deterministic engine whose behaviour tests can script.

use crate::{EngineError, ExecutionEngine};
use async_trait::async_trait;
use meridian_types::{ChainId, Hash, StateChange, Transaction, TransactionTrace};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One recorded call to [`ScriptedEngine::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionCall {
    /// Chain the batch ran against.
    pub chain_id: ChainId,
    /// Disambiguation key passed by the executor.
    pub disambiguation: Hash,
    /// Ids of the executed transactions, in order.
    pub transaction_ids: Vec<Hash>,
}

#[derive(Default)]
struct Script {
    failing: HashSet<Hash>,
    delay: Option<Duration>,
    drop_last_trace: bool,
    internal_error: Option<String>,
}

/// Engine producing one deterministic trace per transaction.
///
/// A successful transaction writes its params under its own id. Individual
/// transactions can be scripted to fail, the whole batch can be delayed
/// (observing cancellation while it waits), truncated or failed outright.
#[derive(Default)]
pub struct ScriptedEngine {
    script: Mutex<Script>,
    calls: Mutex<Vec<ExecutionCall>>,
}

impl ScriptedEngine {
    /// Engine that executes every transaction successfully.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `transaction_id` produce a failed trace.
    pub fn fail_transaction(&self, transaction_id: Hash) {
        self.script.lock().failing.insert(transaction_id);
    }

    /// Wait this long before producing traces.
    pub fn set_delay(&self, delay: Duration) {
        self.script.lock().delay = Some(delay);
    }

    /// Return one trace fewer than requested.
    pub fn drop_last_trace(&self, enabled: bool) {
        self.script.lock().drop_last_trace = enabled;
    }

    /// Fail every batch with [`EngineError::Internal`].
    pub fn fail_batches(&self, message: impl Into<String>) {
        self.script.lock().internal_error = Some(message.into());
    }

    /// Calls received so far.
    pub fn calls(&self) -> Vec<ExecutionCall> {
        self.calls.lock().clone()
    }

    /// The trace this engine produces for `transaction`.
    pub fn trace_for(&self, transaction: &Transaction) -> TransactionTrace {
        let id = transaction.hash();
        if self.script.lock().failing.contains(&id) {
            return TransactionTrace::failure(id, "scripted failure");
        }
        TransactionTrace::success(
            id,
            transaction.method_name.as_bytes().to_vec(),
            vec![],
            vec![StateChange {
                key: id.as_bytes().to_vec(),
                value: Some(transaction.params.clone()),
            }],
        )
    }

    /// Traces for a whole batch, ignoring delays and truncation.
    pub fn traces_for(&self, transactions: &[Transaction]) -> Vec<TransactionTrace> {
        transactions.iter().map(|tx| self.trace_for(tx)).collect()
    }
}

#[async_trait]
impl ExecutionEngine for ScriptedEngine {
    async fn execute(
        &self,
        transactions: &[Transaction],
        chain_id: ChainId,
        cancel: CancellationToken,
        disambiguation: Hash,
    ) -> Result<Vec<TransactionTrace>, EngineError> {
        self.calls.lock().push(ExecutionCall {
            chain_id,
            disambiguation,
            transaction_ids: transactions.iter().map(Transaction::hash).collect(),
        });

        let (delay, drop_last, internal_error) = {
            let script = self.script.lock();
            (
                script.delay,
                script.drop_last_trace,
                script.internal_error.clone(),
            )
        };

        if let Some(delay) = delay {
            tokio::select! {
                _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        if let Some(message) = internal_error {
            return Err(EngineError::Internal(message));
        }

        let mut traces = self.traces_for(transactions);
        if drop_last {
            traces.pop();
        }
        Ok(traces)
    }
}
