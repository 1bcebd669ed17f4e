//! Per-transaction holder with an atomic status cell.

use meridian_types::{BlockHeight, Hash, Transaction, TransactionStatus};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

/// Executed height value meaning "not executed".
const NOT_EXECUTED: u64 = u64::MAX;

/// The single authoritative record of one transaction inside the pool.
#[derive(Debug)]
pub(crate) struct TransactionHolder {
    id: Hash,
    transaction: Arc<Transaction>,
    status: AtomicU8,
    executed_height: AtomicU64,
}

impl TransactionHolder {
    pub(crate) fn new(transaction: Transaction) -> Self {
        Self {
            id: transaction.hash(),
            transaction: Arc::new(transaction),
            status: AtomicU8::new(TransactionStatus::Received as u8),
            executed_height: AtomicU64::new(NOT_EXECUTED),
        }
    }

    pub(crate) fn id(&self) -> Hash {
        self.id
    }

    pub(crate) fn transaction(&self) -> &Arc<Transaction> {
        &self.transaction
    }

    pub(crate) fn status(&self) -> TransactionStatus {
        TransactionStatus::from_u8(self.status.load(Ordering::Acquire))
            .expect("status cell only stores TransactionStatus discriminants")
    }

    /// Move `from -> to` if the holder is currently at `from`.
    ///
    /// Returns whether this caller performed the move.
    pub(crate) fn try_transition(&self, from: TransactionStatus, to: TransactionStatus) -> bool {
        debug_assert!(from.can_transition_to(to), "{from} -> {to}");
        self.status
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn set_executed_height(&self, height: BlockHeight) {
        self.executed_height.store(height.0, Ordering::Release);
    }

    pub(crate) fn executed_height(&self) -> Option<BlockHeight> {
        match self.executed_height.load(Ordering::Acquire) {
            NOT_EXECUTED => None,
            height => Some(BlockHeight(height)),
        }
    }

    pub(crate) fn view(&self) -> TxHolderView {
        TxHolderView {
            id: self.id,
            transaction: Arc::clone(&self.transaction),
            status: self.status(),
            executed_height: self.executed_height(),
        }
    }
}

/// Read-only snapshot of a pooled transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxHolderView {
    /// Transaction id.
    pub id: Hash,
    /// The payload.
    pub transaction: Arc<Transaction>,
    /// Status at the time of the lookup.
    pub status: TransactionStatus,
    /// Height the transaction was executed at, once `Executed`.
    pub executed_height: Option<BlockHeight>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_types::test_utils::test_transaction;
    use TransactionStatus::*;

    #[test]
    fn test_transition_requires_exact_status() {
        let holder = TransactionHolder::new(test_transaction(1));
        assert!(!holder.try_transition(Validating, Validated));
        assert!(holder.try_transition(Received, Validating));
        assert!(!holder.try_transition(Received, Validating));
        assert_eq!(holder.status(), Validating);
    }

    #[test]
    fn test_view_reports_execution_height() {
        let holder = TransactionHolder::new(test_transaction(1));
        assert_eq!(holder.view().executed_height, None);
        holder.set_executed_height(BlockHeight(7));
        let view = holder.view();
        assert_eq!(view.executed_height, Some(BlockHeight(7)));
        assert_eq!(view.id, test_transaction(1).hash());
    }
}
