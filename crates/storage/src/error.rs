//! Storage errors.

use thiserror::Error;

/// Errors returned by storage backends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The backend could not be reached or refused the operation.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Stored bytes could not be decoded.
    #[error("corrupted record: {0}")]
    Corrupted(String),
}
