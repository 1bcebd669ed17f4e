//! Block and BlockHeader types.

use crate::{
    BinaryMerkleTree, BlockHeight, ChainId, Hash, ParentChainBlockInfo, SideChainBlockInfo,
    Transaction,
};
use serde::{Deserialize, Serialize};

/// Block header.
///
/// Carries the chain position and the commitments a validator checks the
/// executed body against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Chain the block belongs to.
    pub chain_id: ChainId,

    /// Block height in the chain (genesis = 0).
    pub height: BlockHeight,

    /// Hash of the previous block.
    pub previous_block_hash: Hash,

    /// Declared Merkle root over the per-transaction state hashes.
    pub merkle_tree_root_of_world_state: Hash,

    /// Merkle root over the body's transaction ids.
    pub merkle_tree_root_of_transactions: Hash,

    /// Merkle root over the transaction roots of indexed side-chain blocks.
    pub side_chain_transactions_root: Hash,

    /// Per-block salt mixed into intermediate-state keys.
    pub disambiguation_salt: Hash,

    /// Unix timestamp (milliseconds) when the block was produced.
    pub time: u64,
}

impl BlockHeader {
    /// Compute hash of this block header.
    pub fn hash(&self) -> Hash {
        let bytes = bincode::serialize(self).expect("BlockHeader serialization should never fail");
        Hash::from_bytes(&bytes)
    }

    /// Check if this is the genesis block header.
    pub fn is_genesis(&self) -> bool {
        self.height == BlockHeight::GENESIS
    }

    /// Key that separates this block's intermediate state from any other
    /// execution at the same height.
    pub fn disambiguation_hash(&self) -> Hash {
        Hash::from_parts(&[
            b"disambiguation",
            &self.chain_id.0.to_le_bytes(),
            &self.height.0.to_le_bytes(),
            self.disambiguation_salt.as_bytes(),
        ])
    }
}

/// Block body: ordered transactions plus indexed cross-chain data.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockBody {
    /// Transactions in execution order.
    pub transactions: Vec<Transaction>,

    /// Side-chain blocks indexed by this block.
    pub side_chain_block_infos: Vec<SideChainBlockInfo>,

    /// Parent-chain block indexed by this block, if any.
    pub parent_chain_block_info: Option<ParentChainBlockInfo>,
}

impl BlockBody {
    /// Ids of the body's transactions in order.
    pub fn transaction_ids(&self) -> Vec<Hash> {
        self.transactions.iter().map(Transaction::hash).collect()
    }

    /// Merkle tree over the transaction ids.
    pub fn transactions_merkle_tree(&self) -> BinaryMerkleTree {
        BinaryMerkleTree::from_leaves(self.transaction_ids())
    }

    /// Merkle tree over the indexed side-chain transaction roots.
    pub fn side_chain_transactions_merkle_tree(&self) -> BinaryMerkleTree {
        BinaryMerkleTree::from_leaves(
            self.side_chain_block_infos
                .iter()
                .map(|info| info.transaction_mkroot)
                .collect(),
        )
    }
}

/// Complete block with header and body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block header.
    pub header: BlockHeader,

    /// Block body.
    pub body: BlockBody,
}

impl Block {
    /// Block hash (hash of the header).
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    /// Block height.
    pub fn height(&self) -> BlockHeight {
        self.header.height
    }

    /// Number of transactions in the body.
    pub fn transaction_count(&self) -> usize {
        self.body.transactions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Address;

    fn header(height: u64, salt: &[u8]) -> BlockHeader {
        BlockHeader {
            chain_id: ChainId(1),
            height: BlockHeight(height),
            previous_block_hash: Hash::from_bytes(b"parent"),
            merkle_tree_root_of_world_state: Hash::ZERO,
            merkle_tree_root_of_transactions: Hash::ZERO,
            side_chain_transactions_root: Hash::ZERO,
            disambiguation_salt: Hash::from_bytes(salt),
            time: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_disambiguation_hash_separates_salts_and_heights() {
        let a = header(5, b"a");
        assert_eq!(a.disambiguation_hash(), header(5, b"a").disambiguation_hash());
        assert_ne!(a.disambiguation_hash(), header(5, b"b").disambiguation_hash());
        assert_ne!(a.disambiguation_hash(), header(6, b"a").disambiguation_hash());
    }

    #[test]
    fn test_body_merkle_trees() {
        let tx = Transaction {
            from: Address([1u8; 32]),
            to: Address([2u8; 32]),
            method_name: "Noop".into(),
            params: vec![],
            ref_block_number: BlockHeight(0),
            ref_block_prefix: vec![],
        };
        let body = BlockBody {
            transactions: vec![tx.clone()],
            side_chain_block_infos: vec![SideChainBlockInfo {
                chain_id: ChainId(2),
                height: BlockHeight(3),
                block_hash: Hash::from_bytes(b"side"),
                transaction_mkroot: Hash::from_bytes(b"side-root"),
            }],
            parent_chain_block_info: None,
        };

        assert_eq!(body.transactions_merkle_tree().root, tx.hash());
        assert_eq!(
            body.side_chain_transactions_merkle_tree().root,
            Hash::from_bytes(b"side-root")
        );
        assert!(BlockBody::default().transactions_merkle_tree().is_empty());
    }
}
