//! Test helpers for Meridian: an in-memory node backend plus block fixtures.
//!
//! # Example
//!
//! ```rust
//! use meridian_test_helpers::Harness;
//! use meridian_types::test_utils::test_transaction;
//!
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! runtime.block_on(async {
//!     let harness = Harness::new();
//!     let block = harness.next_block(vec![test_transaction(1)]).await;
//!     assert_eq!(block.height().0, 1);
//! });
//! ```

pub mod fixtures;

use meridian_crosschain::CrossChainCache;
use meridian_engine::test_utils::ScriptedEngine;
use meridian_storage::ChainStore;
use meridian_storage_memory::MemoryStorage;
use meridian_types::test_utils::{test_block, TEST_CHAIN};
use meridian_types::{Block, ChainId, Transaction};
use std::sync::Arc;

/// Parent chain of [`TEST_CHAIN`] in harnesses built with [`Harness::side_chain`].
pub const TEST_PARENT_CHAIN: ChainId = ChainId(1);

/// In-memory collaborators for exercising the block pipeline.
///
/// Storage starts with a genesis block for [`TEST_CHAIN`].
pub struct Harness {
    /// Chain, transaction, result and Merkle tree storage.
    pub storage: Arc<MemoryStorage>,
    /// Deterministic execution engine.
    pub engine: Arc<ScriptedEngine>,
    /// Cross-chain info cache.
    pub cross_chain: Arc<CrossChainCache>,
    /// The genesis block in `storage`.
    pub genesis: Block,
}

impl Harness {
    /// Harness for a main chain (no parent chain).
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Harness for a side chain of [`TEST_PARENT_CHAIN`].
    pub fn side_chain() -> Self {
        Self::build(Some(TEST_PARENT_CHAIN))
    }

    fn build(parent_chain_id: Option<ChainId>) -> Self {
        let genesis = test_block(TEST_CHAIN, 0, vec![]);
        Self {
            storage: Arc::new(MemoryStorage::with_genesis(genesis.clone())),
            engine: Arc::new(ScriptedEngine::new()),
            cross_chain: Arc::new(CrossChainCache::new(parent_chain_id)),
            genesis,
        }
    }

    /// A verifying block on top of the current head.
    pub async fn next_block(&self, transactions: Vec<Transaction>) -> Block {
        let head = self
            .storage
            .current_height()
            .await
            .expect("memory storage height is always readable");
        let mut block = fixtures::sealed_block(&self.engine, TEST_CHAIN, head.0 + 1, transactions);
        if let Some(previous) = self.storage.block(head) {
            block.header.previous_block_hash = previous.hash();
        }
        block
    }

    /// Re-seal `block` after a test edited its body.
    pub fn reseal(&self, block: &mut Block) {
        fixtures::seal(&self.engine, block);
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
