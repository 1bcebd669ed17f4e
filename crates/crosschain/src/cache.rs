//! In-memory cross-chain info cache.

use crate::CrossChainInfoSource;
use async_trait::async_trait;
use dashmap::DashMap;
use meridian_types::{BlockHeight, ChainId, ParentChainBlockInfo, SideChainBlockInfo};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace, warn};

/// Block infos fetched from one remote chain, awaiting indexing.
#[derive(Debug)]
struct ChainQueue<T> {
    /// Height of the last indexed block (genesis when nothing was indexed).
    indexed_height: BlockHeight,
    /// Fetched infos by height.
    pending: BTreeMap<BlockHeight, T>,
}

impl<T> Default for ChainQueue<T> {
    fn default() -> Self {
        Self {
            indexed_height: BlockHeight::GENESIS,
            pending: BTreeMap::new(),
        }
    }
}

impl<T> ChainQueue<T> {
    fn target_height(&self) -> BlockHeight {
        self.indexed_height.next()
    }

    fn next(&self) -> Option<&T> {
        self.pending.get(&self.target_height())
    }

    /// Remove the next entry and advance the indexed height.
    fn advance(&mut self) -> Option<T> {
        let target = self.target_height();
        let taken = self.pending.remove(&target)?;
        self.indexed_height = target;
        // Anything at or below the indexed height can never be taken.
        self.pending = self.pending.split_off(&target.next());
        Some(taken)
    }
}

/// Cache of side-chain and parent-chain block infos.
///
/// Side chains are indexed independently of each other; entries must be taken
/// in strictly increasing height order per chain. A side chain that was never
/// registered is not tracked, and its entries are accepted as-is.
pub struct CrossChainCache {
    side_chains: DashMap<ChainId, ChainQueue<SideChainBlockInfo>>,
    parent_chain_id: Option<ChainId>,
    parent: Mutex<ChainQueue<ParentChainBlockInfo>>,
}

impl CrossChainCache {
    /// Create a cache. `parent_chain_id` is `None` for a main chain.
    pub fn new(parent_chain_id: Option<ChainId>) -> Self {
        Self {
            side_chains: DashMap::new(),
            parent_chain_id,
            parent: Mutex::new(ChainQueue::default()),
        }
    }

    /// Start tracking a side chain whose last indexed block is `indexed_height`.
    pub fn register_side_chain(&self, chain_id: ChainId, indexed_height: BlockHeight) {
        self.side_chains.insert(
            chain_id,
            ChainQueue {
                indexed_height,
                pending: BTreeMap::new(),
            },
        );
    }

    /// Set the height of the last indexed parent-chain block.
    pub fn set_parent_indexed_height(&self, height: BlockHeight) {
        let mut parent = self.parent.lock();
        parent.indexed_height = height;
        parent.pending = parent.pending.split_off(&height.next());
    }

    /// Cache a side-chain block info fetched from its chain.
    ///
    /// Ignored when the side chain is not registered or the height is already
    /// indexed.
    pub fn cache_side_chain_block_info(&self, info: SideChainBlockInfo) {
        let Some(mut queue) = self.side_chains.get_mut(&info.chain_id) else {
            warn!(chain_id = info.chain_id.0, "side chain not registered");
            return;
        };
        if info.height <= queue.indexed_height {
            return;
        }
        trace!(chain_id = info.chain_id.0, height = info.height.0, "cached side chain block");
        queue.pending.insert(info.height, info);
    }

    /// Cache a parent-chain block info.
    ///
    /// Ignored when this chain has no parent, the info comes from another
    /// chain, or the height is already indexed.
    pub fn cache_parent_chain_block_info(&self, info: ParentChainBlockInfo) {
        if self.parent_chain_id != Some(info.chain_id) {
            warn!(chain_id = info.chain_id.0, "parent chain block info from unknown chain");
            return;
        }
        let mut parent = self.parent.lock();
        if info.height <= parent.indexed_height {
            return;
        }
        parent.pending.insert(info.height, info);
    }

    /// Height of the last indexed block of a registered side chain.
    pub fn side_chain_indexed_height(&self, chain_id: ChainId) -> Option<BlockHeight> {
        self.side_chains.get(&chain_id).map(|q| q.indexed_height)
    }

    /// Height of the last indexed parent-chain block.
    pub fn parent_indexed_height(&self) -> BlockHeight {
        self.parent.lock().indexed_height
    }
}

#[async_trait]
impl CrossChainInfoSource for CrossChainCache {
    async fn check_side_chain_block_info(&self, info: &SideChainBlockInfo) -> bool {
        match self.side_chains.get(&info.chain_id) {
            Some(queue) => queue.next() == Some(info),
            None => true,
        }
    }

    async fn check_side_chain_block_infos(&self, infos: &[SideChainBlockInfo]) -> bool {
        // Height each side chain must continue from within this batch.
        let mut cursor: HashMap<ChainId, BlockHeight> = HashMap::new();
        for info in infos {
            let expected = cursor.get(&info.chain_id).copied();
            let accepted = match self.side_chains.get(&info.chain_id) {
                Some(queue) => {
                    let height = expected.unwrap_or_else(|| queue.target_height());
                    info.height == height && queue.pending.get(&height) == Some(info)
                }
                None => match expected {
                    Some(height) => info.height == height,
                    None => true,
                },
            };
            if !accepted {
                trace!(
                    chain_id = info.chain_id.0,
                    height = info.height.0,
                    "side chain entry out of sequence"
                );
                return false;
            }
            cursor.insert(info.chain_id, info.height.next());
        }
        true
    }

    async fn try_update_and_remove_side_chain_block_info(
        &self,
        info: &SideChainBlockInfo,
    ) -> bool {
        let Some(mut queue) = self.side_chains.get_mut(&info.chain_id) else {
            return true;
        };
        if queue.next() != Some(info) {
            return false;
        }
        queue.advance();
        debug!(chain_id = info.chain_id.0, height = info.height.0, "indexed side chain block");
        true
    }

    async fn try_get_parent_chain_block_info(&self) -> Option<ParentChainBlockInfo> {
        self.parent.lock().next().cloned()
    }

    async fn update_parent_chain_block_info(&self, info: &ParentChainBlockInfo) -> bool {
        if self.parent_chain_id != Some(info.chain_id) {
            return false;
        }
        let mut parent = self.parent.lock();
        if parent.next() != Some(info) {
            return false;
        }
        parent.advance();
        debug!(height = info.height.0, "indexed parent chain block");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_types::Hash;

    fn side(chain: u32, height: u64) -> SideChainBlockInfo {
        SideChainBlockInfo {
            chain_id: ChainId(chain),
            height: BlockHeight(height),
            block_hash: Hash::from_parts(&[b"side", &height.to_le_bytes()]),
            transaction_mkroot: Hash::from_parts(&[b"root", &height.to_le_bytes()]),
        }
    }

    fn parent(height: u64) -> ParentChainBlockInfo {
        ParentChainBlockInfo {
            chain_id: ChainId(1),
            height: BlockHeight(height),
            block_hash: Hash::from_parts(&[b"parent", &height.to_le_bytes()]),
            side_chain_transactions_root: Hash::ZERO,
        }
    }

    #[tokio::test]
    async fn test_side_chain_entries_taken_in_order() {
        let cache = CrossChainCache::new(None);
        cache.register_side_chain(ChainId(7), BlockHeight(0));
        cache.cache_side_chain_block_info(side(7, 2));
        cache.cache_side_chain_block_info(side(7, 1));

        assert!(!cache.check_side_chain_block_info(&side(7, 2)).await);
        assert!(cache.check_side_chain_block_info(&side(7, 1)).await);

        assert!(!cache.try_update_and_remove_side_chain_block_info(&side(7, 2)).await);
        assert!(cache.try_update_and_remove_side_chain_block_info(&side(7, 1)).await);
        assert!(cache.try_update_and_remove_side_chain_block_info(&side(7, 2)).await);
        assert_eq!(cache.side_chain_indexed_height(ChainId(7)), Some(BlockHeight(2)));
        assert!(!cache.check_side_chain_block_info(&side(7, 3)).await);
    }

    #[tokio::test]
    async fn test_side_chain_mismatch_rejected() {
        let cache = CrossChainCache::new(None);
        cache.register_side_chain(ChainId(7), BlockHeight(0));
        cache.cache_side_chain_block_info(side(7, 1));

        let mut forged = side(7, 1);
        forged.transaction_mkroot = Hash::from_bytes(b"forged");
        assert!(!cache.check_side_chain_block_info(&forged).await);
    }

    #[tokio::test]
    async fn test_side_chain_batch_must_be_consecutive() {
        let cache = CrossChainCache::new(None);
        cache.register_side_chain(ChainId(7), BlockHeight(0));
        cache.register_side_chain(ChainId(8), BlockHeight(4));
        cache.cache_side_chain_block_info(side(7, 1));
        cache.cache_side_chain_block_info(side(7, 2));
        cache.cache_side_chain_block_info(side(8, 5));

        assert!(cache.check_side_chain_block_infos(&[]).await);
        assert!(
            cache
                .check_side_chain_block_infos(&[side(7, 1), side(8, 5), side(7, 2)])
                .await
        );
        assert!(!cache.check_side_chain_block_infos(&[side(7, 1), side(7, 1)]).await);
        assert!(!cache.check_side_chain_block_infos(&[side(7, 2), side(7, 1)]).await);
        // Height 3 was never fetched.
        assert!(
            !cache
                .check_side_chain_block_infos(&[side(7, 1), side(7, 2), side(7, 3)])
                .await
        );
        // Untracked chains are only checked for sequence.
        assert!(cache.check_side_chain_block_infos(&[side(3, 9), side(3, 10)]).await);
        assert!(!cache.check_side_chain_block_infos(&[side(3, 9), side(3, 9)]).await);

        assert_eq!(cache.side_chain_indexed_height(ChainId(7)), Some(BlockHeight(0)));
    }

    #[tokio::test]
    async fn test_unregistered_side_chain_passes() {
        let cache = CrossChainCache::new(None);
        assert!(cache.check_side_chain_block_info(&side(3, 9)).await);
        assert!(cache.try_update_and_remove_side_chain_block_info(&side(3, 9)).await);
    }

    #[tokio::test]
    async fn test_parent_chain_flow() {
        let cache = CrossChainCache::new(Some(ChainId(1)));
        assert_eq!(cache.try_get_parent_chain_block_info().await, None);

        cache.cache_parent_chain_block_info(parent(1));
        cache.cache_parent_chain_block_info(parent(2));
        assert_eq!(cache.try_get_parent_chain_block_info().await, Some(parent(1)));

        assert!(!cache.update_parent_chain_block_info(&parent(2)).await);
        assert!(cache.update_parent_chain_block_info(&parent(1)).await);
        assert_eq!(cache.try_get_parent_chain_block_info().await, Some(parent(2)));
        assert_eq!(cache.parent_indexed_height(), BlockHeight(1));
    }

    #[tokio::test]
    async fn test_parent_info_from_other_chain_ignored() {
        let cache = CrossChainCache::new(Some(ChainId(1)));
        let mut foreign = parent(1);
        foreign.chain_id = ChainId(2);
        cache.cache_parent_chain_block_info(foreign.clone());

        assert_eq!(cache.try_get_parent_chain_block_info().await, None);
        assert!(!cache.update_parent_chain_block_info(&foreign).await);
    }
}
