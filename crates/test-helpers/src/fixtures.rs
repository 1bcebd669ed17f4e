//! Block and cross-chain fixture builders.
//!
//! Blocks built here carry the world-state root a [`ScriptedEngine`] will
//! reproduce, so they verify unless a test tampers with them.

use meridian_engine::test_utils::ScriptedEngine;
use meridian_types::test_utils::{test_address, test_block};
use meridian_types::{
    compute_merkle_root, Block, BlockHeight, ChainId, Hash, ParentChainBlockInfo,
    SideChainBlockInfo, Transaction, TransactionResult,
};

/// World-state root `engine` will compute for `transactions`.
pub fn world_state_root(engine: &ScriptedEngine, transactions: &[Transaction]) -> Hash {
    let state_hashes: Vec<Hash> = engine
        .traces_for(transactions)
        .iter()
        .enumerate()
        .map(|(index, trace)| TransactionResult::from_trace(trace, index as u32).state_hash)
        .collect();
    compute_merkle_root(&state_hashes)
}

/// Set `block`'s commitments from its body and `engine`'s expected results.
pub fn seal(engine: &ScriptedEngine, block: &mut Block) {
    block.header.merkle_tree_root_of_transactions = block.body.transactions_merkle_tree().root;
    block.header.side_chain_transactions_root =
        block.body.side_chain_transactions_merkle_tree().root;
    block.header.merkle_tree_root_of_world_state =
        world_state_root(engine, &block.body.transactions);
}

/// A block at `height` that verifies against `engine`.
pub fn sealed_block(
    engine: &ScriptedEngine,
    chain_id: ChainId,
    height: u64,
    transactions: Vec<Transaction>,
) -> Block {
    let mut block = test_block(chain_id, height, transactions);
    seal(engine, &mut block);
    block
}

/// A side-chain block info with deterministic hashes.
pub fn side_chain_info(chain_id: ChainId, height: u64) -> SideChainBlockInfo {
    let seed = [&chain_id.0.to_le_bytes()[..], &height.to_le_bytes()[..]].concat();
    SideChainBlockInfo {
        chain_id,
        height: BlockHeight(height),
        block_hash: Hash::from_parts(&[b"side-block", &seed]),
        transaction_mkroot: Hash::from_parts(&[b"side-txs", &seed]),
    }
}

/// A parent-chain block info with deterministic hashes.
pub fn parent_chain_info(chain_id: ChainId, height: u64) -> ParentChainBlockInfo {
    let seed = [&chain_id.0.to_le_bytes()[..], &height.to_le_bytes()[..]].concat();
    ParentChainBlockInfo {
        chain_id,
        height: BlockHeight(height),
        block_hash: Hash::from_parts(&[b"parent-block", &seed]),
        side_chain_transactions_root: Hash::from_parts(&[b"parent-side", &seed]),
    }
}

/// The transaction indexing `info` into `chain_id`, anchored to genesis.
pub fn parent_indexing_transaction(
    chain_id: ChainId,
    info: &ParentChainBlockInfo,
    seed: u8,
) -> Transaction {
    Transaction::index_parent_chain(chain_id, test_address(seed), info, BlockHeight::GENESIS, vec![])
}
