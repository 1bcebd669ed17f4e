//! Execution engine interface.
//!
//! The block executor does not run contract code itself. It hands the
//! ordered transactions of a block to an [`ExecutionEngine`] and receives one
//! [`TransactionTrace`](meridian_types::TransactionTrace) per transaction.
//!
//! ```text
//! BlockExecutor                          ExecutionEngine
//!      │                                    │
//!      ├─► execute(txs, chain, cancel, key)►│ runs contracts, collects writes
//!      │                                    │
//!      │◄──────── Vec<TransactionTrace> ◄───┤ (one trace per tx, in order)
//! ```
//!
//! Engines must observe the cancellation token: once it fires, they should
//! stop as soon as possible and return [`EngineError::Cancelled`].

#![warn(missing_docs)]

mod error;
mod traits;

pub use error::EngineError;
pub use traits::ExecutionEngine;

/// Scripted engine for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
