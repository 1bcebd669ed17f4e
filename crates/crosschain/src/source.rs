//! Cross-chain info source trait.

use async_trait::async_trait;
use meridian_types::{ParentChainBlockInfo, SideChainBlockInfo};

/// Provides the side-chain and parent-chain block infos this chain may index.
#[async_trait]
pub trait CrossChainInfoSource: Send + Sync {
    /// Whether `info` is the next side-chain block this chain expects to index.
    async fn check_side_chain_block_info(&self, info: &SideChainBlockInfo) -> bool;

    /// Whether `infos`, taken in order, are the next entries this chain
    /// expects to index.
    ///
    /// Entries of one side chain must be consecutive and each must match the
    /// fetched info at its height. Nothing is consumed.
    async fn check_side_chain_block_infos(&self, infos: &[SideChainBlockInfo]) -> bool;

    /// Mark `info` as indexed and drop it from the source.
    ///
    /// Returns `false` when `info` is not the next expected entry.
    async fn try_update_and_remove_side_chain_block_info(&self, info: &SideChainBlockInfo)
        -> bool;

    /// The next parent-chain block info available for indexing, if any.
    async fn try_get_parent_chain_block_info(&self) -> Option<ParentChainBlockInfo>;

    /// Mark `info` as indexed and drop it from the source.
    ///
    /// Returns `false` when `info` is not the next expected entry.
    async fn update_parent_chain_block_info(&self, info: &ParentChainBlockInfo) -> bool;
}
