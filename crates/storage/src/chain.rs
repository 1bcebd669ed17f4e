//! Chain storage trait.

use crate::StorageError;
use async_trait::async_trait;
use meridian_types::{Block, BlockHeight, Hash};

/// Blocks, canonical hashes and intermediate execution state.
#[async_trait]
pub trait ChainStore: Send + Sync {
    /// Append blocks to the chain, in order.
    async fn add_blocks(&self, blocks: Vec<Block>) -> Result<(), StorageError>;

    /// Discard the intermediate state written by `transaction_ids` under the
    /// disambiguation key of an abandoned block.
    async fn rollback_state_for_transactions(
        &self,
        transaction_ids: Vec<Hash>,
        disambiguation: Hash,
    ) -> Result<(), StorageError>;

    /// Height of the chain head. Genesis is height 0.
    async fn current_height(&self) -> Result<BlockHeight, StorageError>;

    /// Canonical block hash at `height`, if the chain has reached it.
    async fn block_hash_by_height(
        &self,
        height: BlockHeight,
    ) -> Result<Option<Hash>, StorageError>;
}
