//! Transaction and transaction-result stores.

use crate::StorageError;
use async_trait::async_trait;
use meridian_types::{Hash, Transaction, TransactionResult};

/// Finalized transaction payloads, keyed by transaction id.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Look up a finalized transaction.
    async fn get_transaction(&self, id: &Hash) -> Result<Option<Transaction>, StorageError>;

    /// Persist a transaction included in a committed block.
    async fn add_transaction(&self, transaction: Transaction) -> Result<(), StorageError>;
}

/// Execution results, keyed by transaction id.
#[async_trait]
pub trait TransactionResultStore: Send + Sync {
    /// Persist the result of a committed transaction.
    ///
    /// The result must already carry its block number and block hash.
    async fn add_transaction_result(&self, result: TransactionResult) -> Result<(), StorageError>;

    /// Look up the result of a committed transaction.
    async fn get_transaction_result(
        &self,
        id: &Hash,
    ) -> Result<Option<TransactionResult>, StorageError>;
}
