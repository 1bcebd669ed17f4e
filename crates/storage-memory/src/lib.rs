//! # In-Memory Storage
//!
//! In-memory implementation of every `meridian-storage` trait, used by tests
//! and by single-process deployments.
//!
//! Besides storing data, [`MemoryStorage`] records the rollbacks it was asked
//! to perform and can be told to fail writes or rollbacks, so callers can
//! exercise their failure paths.

mod storage;

pub use storage::{MemoryStorage, RollbackRecord};
