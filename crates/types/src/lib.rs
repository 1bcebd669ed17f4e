//! Core types for the Meridian block-processing core.
//!
//! This crate provides the foundational types used by the transaction pool,
//! the block execution pipeline and the node state machine:
//!
//! - **Primitives**: [`Hash`], binary Merkle trees
//! - **Identifiers**: [`BlockHeight`], [`ChainId`], [`Address`]
//! - **Ledger types**: [`Transaction`], [`Block`], [`BlockHeader`], [`BlockBody`]
//! - **Cross-chain**: [`SideChainBlockInfo`], [`ParentChainBlockInfo`]
//! - **Execution output**: [`TransactionTrace`], [`TransactionResult`]
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend on
//! any other workspace crates, making it the foundation layer.

mod block;
mod cross_chain;
mod hash;
mod identifiers;
mod result;
mod transaction;

pub use block::{Block, BlockBody, BlockHeader};
pub use cross_chain::{
    ParentChainBlockInfo, SideChainBlockInfo, CROSS_CHAIN_CONTRACT, RECORD_PARENT_CHAIN_METHOD,
};
pub use hash::{compute_merkle_root, BinaryMerkleTree, Hash, HexError};
pub use identifiers::{Address, BlockHeight, ChainId};
pub use result::{
    LogEvent, StateChange, TransactionResult, TransactionResultStatus, TransactionTrace,
};
pub use transaction::{PayloadError, Transaction, TransactionStatus, TransactionStatusParseError};

/// Test utilities.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use super::*;

    /// Chain id used by test fixtures.
    pub const TEST_CHAIN: ChainId = ChainId(9992731);

    /// Create a test address from a seed byte.
    pub fn test_address(seed: u8) -> Address {
        Address([seed; 32])
    }

    /// Create a transaction anchored to a specific reference block.
    pub fn test_transaction_with_ref(
        seed: u8,
        ref_block_number: BlockHeight,
        ref_block_prefix: Vec<u8>,
    ) -> Transaction {
        Transaction {
            from: test_address(seed),
            to: test_address(seed.wrapping_add(100)),
            method_name: "Transfer".to_string(),
            params: vec![seed, seed.wrapping_add(1), seed.wrapping_add(2)],
            ref_block_number,
            ref_block_prefix,
        }
    }

    /// Create a simple test transaction anchored to genesis.
    pub fn test_transaction(seed: u8) -> Transaction {
        test_transaction_with_ref(seed, BlockHeight::GENESIS, vec![])
    }

    /// Create a header at `height` with zeroed commitments.
    pub fn test_header(chain_id: ChainId, height: u64) -> BlockHeader {
        BlockHeader {
            chain_id,
            height: BlockHeight(height),
            previous_block_hash: Hash::from_parts(&[b"block", &height.saturating_sub(1).to_le_bytes()]),
            merkle_tree_root_of_world_state: Hash::ZERO,
            merkle_tree_root_of_transactions: Hash::ZERO,
            side_chain_transactions_root: Hash::ZERO,
            disambiguation_salt: Hash::from_parts(&[b"salt", &height.to_le_bytes()]),
            time: 1_700_000_000_000 + height * 4_000,
        }
    }

    /// Create a block whose transaction roots match its body.
    ///
    /// The world-state root is left at `Hash::ZERO`; callers that need a
    /// block which verifies must set it from the expected execution results.
    pub fn test_block(chain_id: ChainId, height: u64, transactions: Vec<Transaction>) -> Block {
        let body = BlockBody {
            transactions,
            side_chain_block_infos: vec![],
            parent_chain_block_info: None,
        };
        let mut header = test_header(chain_id, height);
        header.merkle_tree_root_of_transactions = body.transactions_merkle_tree().root;
        header.side_chain_transactions_root = body.side_chain_transactions_merkle_tree().root;
        Block { header, body }
    }
}
