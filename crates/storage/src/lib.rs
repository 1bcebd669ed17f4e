//! Storage traits.
//!
//! This crate defines the durable-storage abstraction the block-processing
//! core talks to. It holds no implementation: `meridian-storage-memory`
//! provides an in-memory backend, and a production node plugs in its own.
//!
//! # Design
//!
//! The stores are split by concern so that each component depends only on
//! what it touches:
//!
//! - [`TransactionStore`]: finalized transaction payloads. The pool consults
//!   it to reject transactions that are already on chain.
//! - [`TransactionResultStore`]: per-transaction execution results.
//! - [`ChainStore`]: blocks, canonical hashes and the engine's intermediate
//!   state. The executor rolls intermediate state back through it.
//! - [`MerkleTreeStore`]: the per-block transaction trees.
//!
//! All methods take `&self`; implementations use interior mutability and are
//! shared as `Arc<dyn Trait>`.

#![warn(missing_docs)]

mod chain;
mod error;
mod merkle;
mod transactions;

pub use chain::ChainStore;
pub use error::StorageError;
pub use merkle::MerkleTreeStore;
pub use transactions::{TransactionResultStore, TransactionStore};
