//! Cross-chain indexing info.
//!
//! Blocks may index side-chain blocks and one parent-chain block. The block
//! executor checks every indexed entry against a [`CrossChainInfoSource`]
//! before execution and advances the source once the block is committed.
//!
//! [`CrossChainCache`] is the in-process source: the cross-chain clients push
//! the block infos they fetch into it, and the executor takes them out in
//! height order.

#![warn(missing_docs)]

mod cache;
mod source;

pub use cache::CrossChainCache;
pub use source::CrossChainInfoSource;
