//! Cross-chain block info indexed into blocks.

use crate::{BlockHeight, ChainId, Hash};
use serde::{Deserialize, Serialize};

/// Name of the system contract that records cross-chain indexing data.
pub const CROSS_CHAIN_CONTRACT: &str = "CrossChain";

/// Method called on [`CROSS_CHAIN_CONTRACT`] to index parent-chain blocks.
pub const RECORD_PARENT_CHAIN_METHOD: &str = "RecordParentChainBlockInfo";

/// A side-chain block header summary indexed into this chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SideChainBlockInfo {
    /// The side chain that produced the block.
    pub chain_id: ChainId,
    /// Height of the side-chain block.
    pub height: BlockHeight,
    /// Hash of the side-chain block.
    pub block_hash: Hash,
    /// Merkle root of the side-chain block's transactions.
    pub transaction_mkroot: Hash,
}

/// A parent-chain block header summary indexed into this chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentChainBlockInfo {
    /// The parent chain.
    pub chain_id: ChainId,
    /// Height of the parent-chain block.
    pub height: BlockHeight,
    /// Hash of the parent-chain block.
    pub block_hash: Hash,
    /// Root over the side-chain transaction roots the parent block indexed.
    pub side_chain_transactions_root: Hash,
}
