//! Block execution pipeline.
//!
//! [`BlockExecutor`] is the only path by which a block's effects reach the
//! ledger. Each call runs
//!
//! ```text
//! Prepare ─► CollectTransactions ─► Execute ─► VerifyCommitment ─► Persist
//!                                      │               │              │
//!                                      └───────────────┴──────────────┴─► Rollback
//! ```
//!
//! and resolves to a [`BlockExecutionResult`]. Expected failures never escape
//! as errors: a rejected block is a result code, and once execution has
//! started any failure rolls back the intermediate state of the block's
//! mined transactions.

#![warn(missing_docs)]

mod config;
mod error;
mod executor;
mod result;

pub use config::ExecutorConfig;
pub use executor::{BlockExecutor, ExecutorContext};
pub use result::{BlockExecutionResult, ExecutionReport, FailureCause};
