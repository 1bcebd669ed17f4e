//! Transaction lifecycle store.
//!
//! [`TransactionLifecycleStore`] owns every transaction the node knows about
//! that is not yet finalized, and tracks each one through
//!
//! ```text
//! Received ──► Validating ──► Validated ──► Executing ──► Executed
//! ```
//!
//! with `Invalid` and `Expired` as dead ends. Network ingestion, validators
//! and the block producer call into the store concurrently. Each holder's
//! status is an atomic cell and every transition is a compare-and-swap, so of
//! several callers attempting the same move exactly one wins.
//!
//! [`ValidationWorker`] drives `Received` transactions through reference-block
//! validation in the background.

#![warn(missing_docs)]

mod config;
mod error;
mod holder;
mod state;
mod validation;

pub use config::PoolConfig;
pub use error::PoolError;
pub use holder::TxHolderView;
pub use state::{PoolStats, TransactionLifecycleStore};
pub use validation::{RefBlockStatus, RefBlockValidator, ValidationOutcome, ValidationWorker};
