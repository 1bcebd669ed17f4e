//! Merkle tree storage trait.

use crate::StorageError;
use async_trait::async_trait;
use meridian_types::{BinaryMerkleTree, BlockHeight, ChainId};

/// Per-block Merkle trees, keyed by chain and height.
#[async_trait]
pub trait MerkleTreeStore: Send + Sync {
    /// Persist the tree over a block's transaction ids.
    async fn add_transactions_merkle_tree(
        &self,
        tree: BinaryMerkleTree,
        chain_id: ChainId,
        height: BlockHeight,
    ) -> Result<(), StorageError>;

    /// Persist the tree over the side-chain transaction roots a block indexed.
    async fn add_side_chain_transactions_merkle_tree(
        &self,
        tree: BinaryMerkleTree,
        chain_id: ChainId,
        height: BlockHeight,
    ) -> Result<(), StorageError>;
}
