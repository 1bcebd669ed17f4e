//! End-to-end tests of the block execution pipeline against in-memory
//! storage, a scripted engine and the cross-chain cache.

use meridian_execution::{
    BlockExecutionResult, BlockExecutor, ExecutorConfig, ExecutorContext, FailureCause,
};
use meridian_mempool::{PoolConfig, TransactionLifecycleStore};
use meridian_storage::{ChainStore, TransactionResultStore};
use meridian_test_helpers::fixtures::{
    parent_chain_info, parent_indexing_transaction, side_chain_info,
};
use meridian_test_helpers::{Harness, TEST_PARENT_CHAIN};
use meridian_types::test_utils::{test_transaction, TEST_CHAIN};
use meridian_types::{BlockHeight, ChainId, Hash, TransactionResultStatus, TransactionStatus};
use std::sync::Arc;
use std::time::Duration;
use tracing_test::traced_test;

fn executor(harness: &Harness) -> BlockExecutor {
    executor_with(harness, ExecutorConfig::default())
}

fn executor_with(harness: &Harness, config: ExecutorConfig) -> BlockExecutor {
    let ctx = ExecutorContext::from_storage(
        harness.storage.clone(),
        harness.engine.clone(),
        harness.cross_chain.clone(),
    );
    let executor = BlockExecutor::new(ctx, config);
    executor.init();
    executor
}

// ═══════════════════════════════════════════════════════════════════════════
// Happy path
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
#[traced_test]
async fn test_valid_block_is_committed() {
    let harness = Harness::new();
    let executor = executor(&harness);
    let txs = vec![test_transaction(1), test_transaction(2), test_transaction(3)];
    let block = harness.next_block(txs.clone()).await;

    let result = executor.execute_block(Some(&block)).await;

    assert_eq!(result, BlockExecutionResult::Success);
    assert_eq!(harness.storage.current_height().await.unwrap(), BlockHeight(1));
    assert_eq!(harness.storage.block(BlockHeight(1)), Some(block.clone()));
    assert_eq!(harness.storage.result_count(), 3);
    for (index, tx) in txs.iter().enumerate() {
        assert!(harness.storage.contains_transaction(&tx.hash()));
        let stored = harness
            .storage
            .get_transaction_result(&tx.hash())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, TransactionResultStatus::Mined);
        assert_eq!(stored.index, index as u32);
        assert_eq!(stored.block_number, BlockHeight(1));
        assert_eq!(stored.block_hash, block.hash());
    }
    assert_eq!(
        harness
            .storage
            .transactions_merkle_tree(TEST_CHAIN, BlockHeight(1))
            .map(|tree| tree.root),
        Some(block.header.merkle_tree_root_of_transactions)
    );
    assert!(harness
        .storage
        .side_chain_transactions_merkle_tree(TEST_CHAIN, BlockHeight(1))
        .is_some());
    assert!(harness.storage.rollbacks().is_empty());

    let calls = harness.engine.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].disambiguation, block.header.disambiguation_hash());
    assert!(logs_contain("executed block"));
}

#[tokio::test]
async fn test_failed_transaction_is_recorded_not_fatal() {
    let harness = Harness::new();
    let executor = executor(&harness);
    let txs = vec![test_transaction(1), test_transaction(2)];
    harness.engine.fail_transaction(txs[1].hash());
    let block = harness.next_block(txs.clone()).await;

    assert_eq!(
        executor.execute_block(Some(&block)).await,
        BlockExecutionResult::Success
    );

    let failed = harness
        .storage
        .get_transaction_result(&txs[1].hash())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failed.status, TransactionResultStatus::Failed);
    assert_eq!(failed.return_value, b"scripted failure".to_vec());
}

#[tokio::test]
async fn test_consecutive_blocks_extend_the_chain() {
    let harness = Harness::new();
    let executor = executor(&harness);

    for seed in 1..=3u8 {
        let block = harness.next_block(vec![test_transaction(seed)]).await;
        assert_eq!(
            executor.execute_block(Some(&block)).await,
            BlockExecutionResult::Success
        );
    }
    assert_eq!(harness.storage.current_height().await.unwrap(), BlockHeight(3));
    assert_eq!(harness.storage.block_count(), 4);
}

// ═══════════════════════════════════════════════════════════════════════════
// Prepare
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_missing_or_empty_block_is_rejected() {
    let harness = Harness::new();
    let executor = executor(&harness);

    assert_eq!(executor.execute_block(None).await, BlockExecutionResult::BlockIsNull);

    let empty = harness.next_block(vec![]).await;
    assert_eq!(
        executor.execute_block(Some(&empty)).await,
        BlockExecutionResult::NoTransaction
    );
    assert!(harness.engine.calls().is_empty());
}

#[tokio::test]
async fn test_uninitialized_and_cancelled_executor_rejects_blocks() {
    let harness = Harness::new();
    let ctx = ExecutorContext::from_storage(
        harness.storage.clone(),
        harness.engine.clone(),
        harness.cross_chain.clone(),
    );
    let executor = BlockExecutor::new(ctx, ExecutorConfig::default());
    let block = harness.next_block(vec![test_transaction(1)]).await;

    assert!(!executor.is_ready());
    assert_eq!(
        executor.execute_block(Some(&block)).await,
        BlockExecutionResult::ExecutionCancelled
    );

    executor.init();
    executor.cancel();
    assert!(!executor.is_ready());
    assert_eq!(
        executor.execute_block(Some(&block)).await,
        BlockExecutionResult::ExecutionCancelled
    );
    assert!(harness.engine.calls().is_empty());

    executor.init();
    assert!(executor.is_ready());
    assert_eq!(
        executor.execute_block(Some(&block)).await,
        BlockExecutionResult::Success
    );
}

#[tokio::test]
async fn test_out_of_order_side_chain_info_is_rejected_without_writes() {
    let harness = Harness::new();
    let side = ChainId(77);
    harness.cross_chain.register_side_chain(side, BlockHeight(0));
    harness.cross_chain.cache_side_chain_block_info(side_chain_info(side, 1));
    harness.cross_chain.cache_side_chain_block_info(side_chain_info(side, 2));
    let executor = executor(&harness);

    let mut block = harness.next_block(vec![test_transaction(1)]).await;
    block.body.side_chain_block_infos = vec![side_chain_info(side, 2)];
    harness.reseal(&mut block);

    assert_eq!(
        executor.execute_block(Some(&block)).await,
        BlockExecutionResult::InvalidSideChainInfo
    );
    assert!(harness.engine.calls().is_empty());
    assert_eq!(harness.storage.block_count(), 1);
    assert!(harness.storage.rollbacks().is_empty());
    assert_eq!(harness.cross_chain.side_chain_indexed_height(side), Some(BlockHeight(0)));
}

#[tokio::test]
async fn test_side_chain_info_is_indexed_on_commit() {
    let harness = Harness::new();
    let side = ChainId(77);
    harness.cross_chain.register_side_chain(side, BlockHeight(0));
    harness.cross_chain.cache_side_chain_block_info(side_chain_info(side, 1));
    let executor = executor(&harness);

    let mut block = harness.next_block(vec![test_transaction(1)]).await;
    block.body.side_chain_block_infos = vec![side_chain_info(side, 1)];
    harness.reseal(&mut block);

    assert_eq!(
        executor.execute_block(Some(&block)).await,
        BlockExecutionResult::Success
    );
    assert_eq!(harness.cross_chain.side_chain_indexed_height(side), Some(BlockHeight(1)));
    assert_eq!(
        harness
            .storage
            .side_chain_transactions_merkle_tree(TEST_CHAIN, BlockHeight(1))
            .map(|tree| tree.root),
        Some(block.header.side_chain_transactions_root)
    );
}

#[tokio::test]
async fn test_one_bad_side_chain_entry_rejects_the_block() {
    let harness = Harness::new();
    let (good, bad) = (ChainId(77), ChainId(78));
    harness.cross_chain.register_side_chain(good, BlockHeight(0));
    harness.cross_chain.register_side_chain(bad, BlockHeight(0));
    harness.cross_chain.cache_side_chain_block_info(side_chain_info(good, 1));
    harness.cross_chain.cache_side_chain_block_info(side_chain_info(bad, 1));
    let executor = executor(&harness);

    let mut block = harness.next_block(vec![test_transaction(1)]).await;
    block.body.side_chain_block_infos = vec![side_chain_info(good, 1), side_chain_info(bad, 2)];
    harness.reseal(&mut block);

    assert_eq!(
        executor.execute_block(Some(&block)).await,
        BlockExecutionResult::InvalidSideChainInfo
    );
    assert!(harness.engine.calls().is_empty());
    assert_eq!(harness.storage.block_count(), 1);
    assert_eq!(harness.storage.result_count(), 0);
    assert!(!harness.storage.contains_transaction(&test_transaction(1).hash()));
    assert_eq!(harness.cross_chain.side_chain_indexed_height(good), Some(BlockHeight(0)));
    assert_eq!(harness.cross_chain.side_chain_indexed_height(bad), Some(BlockHeight(0)));
}

#[tokio::test]
async fn test_duplicate_side_chain_entry_rejects_the_block() {
    let harness = Harness::new();
    let side = ChainId(77);
    harness.cross_chain.register_side_chain(side, BlockHeight(0));
    harness.cross_chain.cache_side_chain_block_info(side_chain_info(side, 1));
    let executor = executor(&harness);

    let mut block = harness.next_block(vec![test_transaction(1)]).await;
    block.body.side_chain_block_infos = vec![side_chain_info(side, 1), side_chain_info(side, 1)];
    harness.reseal(&mut block);

    assert_eq!(
        executor.execute_block(Some(&block)).await,
        BlockExecutionResult::InvalidSideChainInfo
    );
    assert_eq!(harness.storage.block_count(), 1);
    assert_eq!(harness.storage.result_count(), 0);
    assert_eq!(harness.cross_chain.side_chain_indexed_height(side), Some(BlockHeight(0)));

    // The same chain head still accepts a well-formed block.
    let mut fixed = harness.next_block(vec![test_transaction(1)]).await;
    fixed.body.side_chain_block_infos = vec![side_chain_info(side, 1)];
    harness.reseal(&mut fixed);
    assert_eq!(
        executor.execute_block(Some(&fixed)).await,
        BlockExecutionResult::Success
    );
}

#[tokio::test]
async fn test_consecutive_side_chain_entries_are_indexed_together() {
    let harness = Harness::new();
    let side = ChainId(77);
    harness.cross_chain.register_side_chain(side, BlockHeight(0));
    harness.cross_chain.cache_side_chain_block_info(side_chain_info(side, 1));
    harness.cross_chain.cache_side_chain_block_info(side_chain_info(side, 2));
    let executor = executor(&harness);

    let mut block = harness.next_block(vec![test_transaction(1)]).await;
    block.body.side_chain_block_infos = vec![side_chain_info(side, 1), side_chain_info(side, 2)];
    harness.reseal(&mut block);

    assert_eq!(
        executor.execute_block(Some(&block)).await,
        BlockExecutionResult::Success
    );
    assert_eq!(harness.cross_chain.side_chain_indexed_height(side), Some(BlockHeight(2)));
}

#[tokio::test]
async fn test_side_chain_rejected_on_commit_leaves_no_block() {
    let harness = Harness::new();
    let side = ChainId(77);
    harness.cross_chain.register_side_chain(side, BlockHeight(0));
    harness.cross_chain.cache_side_chain_block_info(side_chain_info(side, 1));
    let executor = Arc::new(executor(&harness));
    harness.engine.set_delay(Duration::from_millis(50));

    let mut block = harness.next_block(vec![test_transaction(1)]).await;
    block.body.side_chain_block_infos = vec![side_chain_info(side, 1)];
    harness.reseal(&mut block);

    let running = {
        let executor = executor.clone();
        let block = block.clone();
        tokio::spawn(async move { executor.execute_block_report(Some(&block)).await })
    };
    tokio::time::timeout(Duration::from_secs(5), async {
        while harness.engine.calls().is_empty() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap();
    // The side chain is resynced while the block executes.
    harness.cross_chain.register_side_chain(side, BlockHeight(5));

    let report = running.await.unwrap();
    assert_eq!(report.result, BlockExecutionResult::Failed);
    assert_eq!(report.cause, Some(FailureCause::CrossChain));
    assert_eq!(harness.storage.block_count(), 1);
    assert_eq!(harness.storage.result_count(), 0);
    assert!(harness
        .storage
        .transactions_merkle_tree(TEST_CHAIN, BlockHeight(1))
        .is_none());
    assert_eq!(harness.storage.rollbacks().len(), 1);
}

// ═══════════════════════════════════════════════════════════════════════════
// Parent-chain indexing
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_parent_chain_info_matching_cache_is_indexed() {
    let harness = Harness::side_chain();
    let info = parent_chain_info(TEST_PARENT_CHAIN, 1);
    harness.cross_chain.cache_parent_chain_block_info(info.clone());
    let executor = executor(&harness);

    let mut block = harness
        .next_block(vec![
            test_transaction(1),
            parent_indexing_transaction(TEST_CHAIN, &info, 50),
        ])
        .await;
    block.body.parent_chain_block_info = Some(info);
    harness.reseal(&mut block);

    assert_eq!(
        executor.execute_block(Some(&block)).await,
        BlockExecutionResult::Success
    );
    assert_eq!(harness.cross_chain.parent_indexed_height(), BlockHeight(1));
}

#[tokio::test]
async fn test_parent_chain_info_not_in_cache_is_rejected() {
    let harness = Harness::side_chain();
    harness
        .cross_chain
        .cache_parent_chain_block_info(parent_chain_info(TEST_PARENT_CHAIN, 1));
    let executor = executor(&harness);

    let skipped = parent_chain_info(TEST_PARENT_CHAIN, 2);
    let block = harness
        .next_block(vec![parent_indexing_transaction(TEST_CHAIN, &skipped, 50)])
        .await;

    assert_eq!(
        executor.execute_block(Some(&block)).await,
        BlockExecutionResult::InvalidParentChainBlockInfo
    );
    assert!(harness.engine.calls().is_empty());
    assert_eq!(harness.cross_chain.parent_indexed_height(), BlockHeight(0));
}

#[tokio::test]
async fn test_body_parent_info_without_indexing_transaction_is_rejected() {
    let harness = Harness::side_chain();
    let info = parent_chain_info(TEST_PARENT_CHAIN, 1);
    harness.cross_chain.cache_parent_chain_block_info(info.clone());
    let executor = executor(&harness);

    let mut block = harness.next_block(vec![test_transaction(1)]).await;
    block.body.parent_chain_block_info = Some(info);

    assert_eq!(
        executor.execute_block(Some(&block)).await,
        BlockExecutionResult::InvalidParentChainBlockInfo
    );
}

#[tokio::test]
async fn test_two_indexing_transactions_are_rejected() {
    let harness = Harness::side_chain();
    let first = parent_chain_info(TEST_PARENT_CHAIN, 1);
    let second = parent_chain_info(TEST_PARENT_CHAIN, 2);
    harness.cross_chain.cache_parent_chain_block_info(first.clone());
    harness.cross_chain.cache_parent_chain_block_info(second.clone());
    let executor = executor(&harness);

    let block = harness
        .next_block(vec![
            parent_indexing_transaction(TEST_CHAIN, &first, 50),
            parent_indexing_transaction(TEST_CHAIN, &second, 51),
        ])
        .await;

    assert_eq!(
        executor.execute_block(Some(&block)).await,
        BlockExecutionResult::TooManyTxsForParentChainBlock
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// Verification and rollback
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
#[traced_test]
async fn test_state_root_mismatch_rolls_back_mined_transactions() {
    let harness = Harness::new();
    let executor = executor(&harness);
    let txs = vec![test_transaction(1), test_transaction(2), test_transaction(3)];
    let block = harness.next_block(txs.clone()).await;
    // Sealed while every transaction succeeds; the second now fails.
    harness.engine.fail_transaction(txs[1].hash());

    assert_eq!(
        executor.execute_block(Some(&block)).await,
        BlockExecutionResult::Failed
    );

    let rollbacks = harness.storage.rollbacks();
    assert_eq!(rollbacks.len(), 1);
    assert_eq!(rollbacks[0].transaction_ids, vec![txs[0].hash(), txs[2].hash()]);
    assert_eq!(rollbacks[0].disambiguation, block.header.disambiguation_hash());
    assert_eq!(harness.storage.block_count(), 1);
    assert_eq!(harness.storage.result_count(), 0);
    assert!(executor.is_ready());
    assert!(logs_contain("block state mismatch"));

    let report = executor.execute_block_report(Some(&block)).await;
    assert_eq!(report.result, BlockExecutionResult::Failed);
    assert_eq!(report.cause, Some(FailureCause::StateMismatch));
    assert!(report.is_final_failure());
}

#[tokio::test]
async fn test_missing_trace_fails_block() {
    let harness = Harness::new();
    let executor = executor(&harness);
    let txs = vec![test_transaction(1), test_transaction(2)];
    let block = harness.next_block(txs.clone()).await;
    harness.engine.drop_last_trace(true);

    assert_eq!(
        executor.execute_block(Some(&block)).await,
        BlockExecutionResult::Failed
    );
    let rollbacks = harness.storage.rollbacks();
    assert_eq!(rollbacks.len(), 1);
    assert_eq!(rollbacks[0].transaction_ids, vec![txs[0].hash()]);
    assert_eq!(harness.storage.block_count(), 1);
}

#[tokio::test]
async fn test_engine_error_fails_block() {
    let harness = Harness::new();
    let executor = executor(&harness);
    harness.engine.fail_batches("vm crashed");
    let block = harness.next_block(vec![test_transaction(1)]).await;

    assert_eq!(
        executor.execute_block(Some(&block)).await,
        BlockExecutionResult::Failed
    );
    let rollbacks = harness.storage.rollbacks();
    assert_eq!(rollbacks.len(), 1);
    assert!(rollbacks[0].transaction_ids.is_empty());
}

#[tokio::test]
async fn test_storage_failure_during_commit_rolls_back() {
    let harness = Harness::new();
    let executor = executor(&harness);
    let block = harness.next_block(vec![test_transaction(1)]).await;
    harness.storage.set_fail_writes(true);

    assert_eq!(
        executor.execute_block(Some(&block)).await,
        BlockExecutionResult::Failed
    );
    let rollbacks = harness.storage.rollbacks();
    assert_eq!(rollbacks.len(), 1);
    assert_eq!(rollbacks[0].transaction_ids, vec![test_transaction(1).hash()]);

    let report = executor.execute_block_report(Some(&block)).await;
    assert_eq!(report.cause, Some(FailureCause::Storage));
    assert!(!report.is_final_failure());
}

#[tokio::test]
#[traced_test]
async fn test_rollback_failure_halts_executor() {
    let harness = Harness::new();
    let executor = executor(&harness);
    let tx = test_transaction(1);
    let block = harness.next_block(vec![tx.clone()]).await;
    harness.engine.fail_transaction(tx.hash());
    harness.storage.set_fail_rollbacks(true);

    assert_eq!(
        executor.execute_block(Some(&block)).await,
        BlockExecutionResult::Failed
    );
    assert!(!executor.is_ready());
    assert!(logs_contain("rollback failed"));

    harness.storage.set_fail_rollbacks(false);
    let next = harness.next_block(vec![test_transaction(2)]).await;
    assert_eq!(
        executor.execute_block(Some(&next)).await,
        BlockExecutionResult::ExecutionCancelled
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// Cancellation and timeouts
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_timeout_cancels_execution() {
    let harness = Harness::new();
    let executor = executor_with(
        &harness,
        ExecutorConfig {
            execution_timeout_ms: Some(20),
        },
    );
    harness.engine.set_delay(Duration::from_secs(30));
    let block = harness.next_block(vec![test_transaction(1)]).await;

    assert_eq!(
        executor.execute_block(Some(&block)).await,
        BlockExecutionResult::ExecutionCancelled
    );
    assert_eq!(harness.storage.block_count(), 1);
    assert_eq!(harness.storage.rollbacks().len(), 1);
    // A timeout abandons one block; the executor keeps accepting others.
    assert!(executor.is_ready());
}

#[tokio::test]
async fn test_cancel_aborts_running_block() {
    let harness = Harness::new();
    let executor = Arc::new(executor(&harness));
    harness.engine.set_delay(Duration::from_secs(30));
    let block = harness.next_block(vec![test_transaction(1)]).await;

    let running = {
        let executor = executor.clone();
        let block = block.clone();
        tokio::spawn(async move { executor.execute_block(Some(&block)).await })
    };
    tokio::time::timeout(Duration::from_secs(5), async {
        while harness.engine.calls().is_empty() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap();
    executor.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result, BlockExecutionResult::ExecutionCancelled);
    assert_eq!(harness.storage.block_count(), 1);
}

#[tokio::test]
async fn test_concurrent_calls_are_serialized() {
    let harness = Harness::new();
    let executor = Arc::new(executor(&harness));
    harness.engine.set_delay(Duration::from_millis(20));
    let first = harness.next_block(vec![test_transaction(1)]).await;
    let mut second = first.clone();
    second.header.disambiguation_salt = Hash::from_bytes(b"competing");

    let a = {
        let executor = executor.clone();
        tokio::spawn(async move { executor.execute_block(Some(&first)).await })
    };
    let b = {
        let executor = executor.clone();
        tokio::spawn(async move { executor.execute_block(Some(&second)).await })
    };

    assert_eq!(a.await.unwrap(), BlockExecutionResult::Success);
    assert_eq!(b.await.unwrap(), BlockExecutionResult::Success);
    assert_eq!(harness.engine.calls().len(), 2);
    assert_eq!(harness.storage.block_count(), 2);
}

// ═══════════════════════════════════════════════════════════════════════════
// Pool feedback
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_committed_block_updates_pool() {
    let harness = Harness::new();
    let pool = Arc::new(TransactionLifecycleStore::new(
        PoolConfig::default(),
        harness.storage.clone(),
    ));
    let tx = test_transaction(1);
    pool.add_new_transaction(tx.clone()).await.unwrap();
    let claimed = pool.get_transaction_for_validation().unwrap();
    assert!(pool.validated_tx(&claimed.hash()).unwrap());
    assert_eq!(pool.get_txs_for_execution(10).len(), 1);

    let executor = executor(&harness).with_pool(pool.clone());
    let block = harness.next_block(vec![tx.clone()]).await;
    assert_eq!(
        executor.execute_block(Some(&block)).await,
        BlockExecutionResult::Success
    );

    let view = pool.get_tx_holder_view(&tx.hash()).unwrap();
    assert_eq!(view.status, TransactionStatus::Executed);
    assert_eq!(view.executed_height, Some(BlockHeight(1)));
    assert_eq!(pool.current_height(), BlockHeight(1));
}
