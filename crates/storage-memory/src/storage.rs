//! In-memory storage implementation.

use async_trait::async_trait;
use meridian_storage::{
    ChainStore, MerkleTreeStore, StorageError, TransactionResultStore, TransactionStore,
};
use meridian_types::{
    BinaryMerkleTree, Block, BlockHeight, ChainId, Hash, Transaction, TransactionResult,
};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// A rollback requested through [`ChainStore::rollback_state_for_transactions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackRecord {
    /// Transactions whose intermediate state was discarded.
    pub transaction_ids: Vec<Hash>,
    /// Disambiguation key of the abandoned block.
    pub disambiguation: Hash,
}

/// In-memory storage for chain data, transactions, results and Merkle trees.
///
/// All fields use `RwLock` so every trait method can take `&self`.
#[derive(Default)]
pub struct MemoryStorage {
    blocks: RwLock<BTreeMap<BlockHeight, Block>>,
    transactions: RwLock<HashMap<Hash, Transaction>>,
    results: RwLock<HashMap<Hash, TransactionResult>>,
    transaction_trees: RwLock<HashMap<(ChainId, BlockHeight), BinaryMerkleTree>>,
    side_chain_trees: RwLock<HashMap<(ChainId, BlockHeight), BinaryMerkleTree>>,
    rollbacks: RwLock<Vec<RollbackRecord>>,
    fail_writes: AtomicBool,
    fail_rollbacks: AtomicBool,
}

impl MemoryStorage {
    /// Create empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create storage whose chain starts at `genesis`.
    pub fn with_genesis(genesis: Block) -> Self {
        let storage = Self::new();
        storage.blocks.write().insert(genesis.height(), genesis);
        storage
    }

    /// Make every subsequent write fail with [`StorageError::Unavailable`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent rollback fail with [`StorageError::Unavailable`].
    pub fn set_fail_rollbacks(&self, fail: bool) {
        self.fail_rollbacks.store(fail, Ordering::SeqCst);
    }

    /// Rollbacks performed so far, oldest first.
    pub fn rollbacks(&self) -> Vec<RollbackRecord> {
        self.rollbacks.read().clone()
    }

    /// Block stored at `height`.
    pub fn block(&self, height: BlockHeight) -> Option<Block> {
        self.blocks.read().get(&height).cloned()
    }

    /// Number of stored blocks, genesis included.
    pub fn block_count(&self) -> usize {
        self.blocks.read().len()
    }

    /// Whether a finalized transaction with this id is stored.
    pub fn contains_transaction(&self, id: &Hash) -> bool {
        self.transactions.read().contains_key(id)
    }

    /// Number of stored transaction results.
    pub fn result_count(&self) -> usize {
        self.results.read().len()
    }

    /// Transaction tree persisted for a block.
    pub fn transactions_merkle_tree(
        &self,
        chain_id: ChainId,
        height: BlockHeight,
    ) -> Option<BinaryMerkleTree> {
        self.transaction_trees.read().get(&(chain_id, height)).cloned()
    }

    /// Side-chain transaction-root tree persisted for a block.
    pub fn side_chain_transactions_merkle_tree(
        &self,
        chain_id: ChainId,
        height: BlockHeight,
    ) -> Option<BinaryMerkleTree> {
        self.side_chain_trees.read().get(&(chain_id, height)).cloned()
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("writes disabled".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionStore for MemoryStorage {
    async fn get_transaction(&self, id: &Hash) -> Result<Option<Transaction>, StorageError> {
        Ok(self.transactions.read().get(id).cloned())
    }

    async fn add_transaction(&self, transaction: Transaction) -> Result<(), StorageError> {
        self.check_writable()?;
        self.transactions
            .write()
            .insert(transaction.hash(), transaction);
        Ok(())
    }
}

#[async_trait]
impl TransactionResultStore for MemoryStorage {
    async fn add_transaction_result(&self, result: TransactionResult) -> Result<(), StorageError> {
        self.check_writable()?;
        self.results.write().insert(result.transaction_id, result);
        Ok(())
    }

    async fn get_transaction_result(
        &self,
        id: &Hash,
    ) -> Result<Option<TransactionResult>, StorageError> {
        Ok(self.results.read().get(id).cloned())
    }
}

#[async_trait]
impl ChainStore for MemoryStorage {
    async fn add_blocks(&self, blocks: Vec<Block>) -> Result<(), StorageError> {
        self.check_writable()?;
        let mut stored = self.blocks.write();
        for block in blocks {
            debug!(height = block.height().0, "storing block");
            stored.insert(block.height(), block);
        }
        Ok(())
    }

    async fn rollback_state_for_transactions(
        &self,
        transaction_ids: Vec<Hash>,
        disambiguation: Hash,
    ) -> Result<(), StorageError> {
        if self.fail_rollbacks.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("rollbacks disabled".into()));
        }
        self.rollbacks.write().push(RollbackRecord {
            transaction_ids,
            disambiguation,
        });
        Ok(())
    }

    async fn current_height(&self) -> Result<BlockHeight, StorageError> {
        Ok(self
            .blocks
            .read()
            .keys()
            .next_back()
            .copied()
            .unwrap_or(BlockHeight::GENESIS))
    }

    async fn block_hash_by_height(
        &self,
        height: BlockHeight,
    ) -> Result<Option<Hash>, StorageError> {
        Ok(self.blocks.read().get(&height).map(Block::hash))
    }
}

#[async_trait]
impl MerkleTreeStore for MemoryStorage {
    async fn add_transactions_merkle_tree(
        &self,
        tree: BinaryMerkleTree,
        chain_id: ChainId,
        height: BlockHeight,
    ) -> Result<(), StorageError> {
        self.check_writable()?;
        self.transaction_trees
            .write()
            .insert((chain_id, height), tree);
        Ok(())
    }

    async fn add_side_chain_transactions_merkle_tree(
        &self,
        tree: BinaryMerkleTree,
        chain_id: ChainId,
        height: BlockHeight,
    ) -> Result<(), StorageError> {
        self.check_writable()?;
        self.side_chain_trees.write().insert((chain_id, height), tree);
        Ok(())
    }
}
