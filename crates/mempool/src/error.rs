//! Pool errors.

use meridian_storage::StorageError;
use meridian_types::{BlockHeight, Hash};
use thiserror::Error;

/// Errors returned by the transaction pool.
///
/// Losing a status race is not an error; see the transition methods of
/// [`TransactionLifecycleStore`](crate::TransactionLifecycleStore).
#[derive(Debug, Error)]
pub enum PoolError {
    /// A by-hash operation named a transaction the pool does not hold.
    #[error("transaction {0} not found in pool")]
    NotFound(Hash),

    /// The transaction is already finalized on the ledger.
    #[error("transaction {0} is already finalized")]
    DuplicateFinalized(Hash),

    /// A block header arrived out of sequence.
    #[error("unexpected block height {received}, pool is at {current}")]
    UnexpectedHeight {
        /// Height the pool was at.
        current: BlockHeight,
        /// Height of the offending header.
        received: BlockHeight,
    },

    /// The durable store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
