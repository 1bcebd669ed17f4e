//! The block executor.

use crate::error::StageError;
use crate::{BlockExecutionResult, ExecutionReport, ExecutorConfig};
use arc_swap::ArcSwapOption;
use meridian_crosschain::CrossChainInfoSource;
use meridian_engine::ExecutionEngine;
use meridian_mempool::{PoolError, TransactionLifecycleStore};
use meridian_storage::{
    ChainStore, MerkleTreeStore, TransactionResultStore, TransactionStore,
};
use meridian_types::{
    compute_merkle_root, Block, Hash, ParentChainBlockInfo, Transaction, TransactionResult,
    TransactionTrace,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// The collaborators a [`BlockExecutor`] works against.
#[derive(Clone)]
pub struct ExecutorContext {
    /// Runs the block's transactions.
    pub engine: Arc<dyn ExecutionEngine>,
    /// Blocks and intermediate state.
    pub chain: Arc<dyn ChainStore>,
    /// Finalized transactions.
    pub transactions: Arc<dyn TransactionStore>,
    /// Transaction results.
    pub results: Arc<dyn TransactionResultStore>,
    /// Per-block Merkle trees.
    pub merkle_trees: Arc<dyn MerkleTreeStore>,
    /// Side-chain and parent-chain indexing info.
    pub cross_chain: Arc<dyn CrossChainInfoSource>,
}

impl ExecutorContext {
    /// Context whose stores are all served by one backend.
    pub fn from_storage<S>(
        storage: Arc<S>,
        engine: Arc<dyn ExecutionEngine>,
        cross_chain: Arc<dyn CrossChainInfoSource>,
    ) -> Self
    where
        S: ChainStore + TransactionStore + TransactionResultStore + MerkleTreeStore + 'static,
    {
        Self {
            engine,
            chain: storage.clone(),
            transactions: storage.clone(),
            results: storage.clone(),
            merkle_trees: storage,
            cross_chain,
        }
    }
}

/// Executes and commits blocks.
///
/// # Lifecycle
///
/// A new executor rejects every block with
/// [`BlockExecutionResult::ExecutionCancelled`] until [`init`](Self::init)
/// installs a cancellation token. [`cancel`](Self::cancel) fires that token:
/// a running engine call aborts and later blocks are rejected again until the
/// next `init`.
///
/// # Concurrency
///
/// `execute_block` holds an async mutex for its whole duration, so concurrent
/// calls on one executor run one after another.
///
/// # Rollback failure
///
/// If the chain store cannot roll back an abandoned block, the executor
/// cancels itself: the ledger may hold stale intermediate state and no further
/// block is accepted until the driver calls `init` again.
pub struct BlockExecutor {
    ctx: ExecutorContext,
    config: ExecutorConfig,
    pool: Option<Arc<TransactionLifecycleStore>>,
    cancel: ArcSwapOption<CancellationToken>,
    writer: Mutex<()>,
}

impl BlockExecutor {
    /// Create an executor. Call [`init`](Self::init) before executing blocks.
    pub fn new(ctx: ExecutorContext, config: ExecutorConfig) -> Self {
        Self {
            ctx,
            config,
            pool: None,
            cancel: ArcSwapOption::empty(),
            writer: Mutex::new(()),
        }
    }

    /// Report committed blocks back to `pool`.
    ///
    /// After each commit every transaction of the block is marked executed
    /// and the pool advances to the block's height.
    pub fn with_pool(mut self, pool: Arc<TransactionLifecycleStore>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Install a fresh cancellation token and start accepting blocks.
    pub fn init(&self) {
        self.cancel.store(Some(Arc::new(CancellationToken::new())));
        debug!("block executor initialized");
    }

    /// Fire the current cancellation token.
    pub fn cancel(&self) {
        if let Some(token) = self.cancel.load_full() {
            token.cancel();
            debug!("block executor cancelled");
        }
    }

    /// Whether blocks are currently accepted.
    pub fn is_ready(&self) -> bool {
        self.cancel
            .load_full()
            .is_some_and(|token| !token.is_cancelled())
    }

    /// Execute `block` and commit it if its state commitment verifies.
    pub async fn execute_block(&self, block: Option<&Block>) -> BlockExecutionResult {
        self.execute_block_report(block).await.result
    }

    /// Like [`execute_block`](Self::execute_block), also reporting why a
    /// started block was abandoned.
    pub async fn execute_block_report(&self, block: Option<&Block>) -> ExecutionReport {
        let _writer = self.writer.lock().await;
        let started = Instant::now();

        let (block, token) = match self.prepare(block).await {
            Ok(prepared) => prepared,
            Err(result) => {
                debug!(%result, "block rejected in prepare");
                return ExecutionReport::new(result);
            }
        };

        let report = self.run(block, token).await;
        info!(
            height = block.height().0,
            hash = %block.hash(),
            transactions = block.transaction_count(),
            result = %report.result,
            cause = report.cause.map(|cause| cause.as_str()),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "executed block"
        );
        report
    }

    async fn run(&self, block: &Block, token: CancellationToken) -> ExecutionReport {
        let parent_info = match self.collect_transactions(block).await {
            Ok(info) => info,
            Err(result) => return ExecutionReport::new(result),
        };

        let disambiguation = block.header.disambiguation_hash();
        let mut results = Vec::new();
        match self
            .execute_and_commit(block, token, disambiguation, parent_info, &mut results)
            .await
        {
            Ok(()) => {
                self.feed_pool(block);
                ExecutionReport::new(BlockExecutionResult::Success)
            }
            Err(e) => {
                match &e {
                    StageError::IncorrectStateMerkleTree { .. } => {
                        error!(height = block.height().0, error = %e, "block state mismatch")
                    }
                    _ => warn!(height = block.height().0, error = %e, "block abandoned"),
                }
                self.rollback(&results, disambiguation).await;
                ExecutionReport {
                    result: e.outcome(),
                    cause: Some(e.cause()),
                }
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Prepare / CollectTransactions
    // ═══════════════════════════════════════════════════════════════════════

    async fn prepare<'b>(
        &self,
        block: Option<&'b Block>,
    ) -> Result<(&'b Block, CancellationToken), BlockExecutionResult> {
        let Some(token) = self.cancel.load_full() else {
            warn!("block executor not initialized");
            return Err(BlockExecutionResult::ExecutionCancelled);
        };
        if token.is_cancelled() {
            return Err(BlockExecutionResult::ExecutionCancelled);
        }

        let Some(block) = block else {
            warn!("block is null");
            return Err(BlockExecutionResult::BlockIsNull);
        };
        if block.body.transactions.is_empty() {
            warn!(height = block.height().0, "transaction list is empty");
            return Err(BlockExecutionResult::NoTransaction);
        }

        let side_infos = &block.body.side_chain_block_infos;
        if !self.ctx.cross_chain.check_side_chain_block_infos(side_infos).await {
            warn!(
                height = block.height().0,
                entries = side_infos.len(),
                "side chain block infos rejected"
            );
            return Err(BlockExecutionResult::InvalidSideChainInfo);
        }

        Ok((block, token.child_token()))
    }

    /// Check the block's parent-chain indexing against the cached info.
    ///
    /// Returns the parent-chain block info the block indexes, if any.
    async fn collect_transactions(
        &self,
        block: &Block,
    ) -> Result<Option<ParentChainBlockInfo>, BlockExecutionResult> {
        let chain_id = block.header.chain_id;
        let mut indexing = block
            .body
            .transactions
            .iter()
            .filter(|tx| tx.is_parent_chain_indexing(chain_id));

        let carried = match (indexing.next(), indexing.next()) {
            (None, _) => None,
            (Some(tx), None) => match tx.parent_chain_block_info(chain_id) {
                Ok(info) => info,
                Err(e) => {
                    warn!(error = %e, "undecodable parent chain block info");
                    return Err(BlockExecutionResult::InvalidParentChainBlockInfo);
                }
            },
            (Some(_), Some(_)) => {
                warn!(height = block.height().0, "more than one parent chain indexing transaction");
                return Err(BlockExecutionResult::TooManyTxsForParentChainBlock);
            }
        };

        if block.body.parent_chain_block_info.is_some()
            && block.body.parent_chain_block_info != carried
        {
            warn!("body parent chain block info differs from indexing transaction");
            return Err(BlockExecutionResult::InvalidParentChainBlockInfo);
        }

        if let Some(info) = &carried {
            let cached = self.ctx.cross_chain.try_get_parent_chain_block_info().await;
            if cached.as_ref() != Some(info) {
                warn!(
                    indexed = info.height.0,
                    cached = ?cached.map(|c| c.height.0),
                    "parent chain block info does not match cache"
                );
                return Err(BlockExecutionResult::InvalidParentChainBlockInfo);
            }
        }
        Ok(carried)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Execute / VerifyCommitment / Persist
    // ═══════════════════════════════════════════════════════════════════════

    /// Stages 3-5. `results` holds whatever was produced when a stage fails.
    async fn execute_and_commit(
        &self,
        block: &Block,
        token: CancellationToken,
        disambiguation: Hash,
        parent_info: Option<ParentChainBlockInfo>,
        results: &mut Vec<TransactionResult>,
    ) -> Result<(), StageError> {
        let traces = self.execute_transactions(block, &token, disambiguation).await?;
        let ordered = order_results(&block.body.transactions, traces);
        *results = ordered.results;
        if let Some(e) = ordered.error {
            return Err(e);
        }
        if token.is_cancelled() {
            return Err(StageError::Cancelled);
        }

        verify_commitment(block, results)?;
        self.persist(block, parent_info, results).await
    }

    async fn execute_transactions(
        &self,
        block: &Block,
        token: &CancellationToken,
        disambiguation: Hash,
    ) -> Result<Vec<TransactionTrace>, StageError> {
        let call = self.ctx.engine.execute(
            &block.body.transactions,
            block.header.chain_id,
            token.clone(),
            disambiguation,
        );

        let traces = match self.config.execution_timeout() {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(traces) => traces,
                Err(_) => {
                    token.cancel();
                    return Err(StageError::TimedOut(limit));
                }
            },
            None => call.await,
        }?;
        trace!(traces = traces.len(), "engine finished");
        Ok(traces)
    }

    async fn persist(
        &self,
        block: &Block,
        parent_info: Option<ParentChainBlockInfo>,
        results: &[TransactionResult],
    ) -> Result<(), StageError> {
        let chain_id = block.header.chain_id;
        let height = block.height();

        // Cross-chain entries are consumed before any block data is written.
        for info in &block.body.side_chain_block_infos {
            if !self
                .ctx
                .cross_chain
                .try_update_and_remove_side_chain_block_info(info)
                .await
            {
                return Err(StageError::SideChainUpdateRejected {
                    chain_id: info.chain_id,
                    height: info.height,
                });
            }
        }
        if let Some(info) = &parent_info {
            if !self.ctx.cross_chain.update_parent_chain_block_info(info).await {
                return Err(StageError::ParentChainUpdateRejected(info.height));
            }
        }

        self.ctx.chain.add_blocks(vec![block.clone()]).await?;
        self.ctx
            .merkle_trees
            .add_transactions_merkle_tree(block.body.transactions_merkle_tree(), chain_id, height)
            .await?;
        self.ctx
            .merkle_trees
            .add_side_chain_transactions_merkle_tree(
                block.body.side_chain_transactions_merkle_tree(),
                chain_id,
                height,
            )
            .await?;

        for transaction in &block.body.transactions {
            self.ctx.transactions.add_transaction(transaction.clone()).await?;
        }
        let block_hash = block.hash();
        for result in results {
            let mut result = result.clone();
            result.block_number = height;
            result.block_hash = block_hash;
            self.ctx.results.add_transaction_result(result).await?;
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Rollback / pool feedback
    // ═══════════════════════════════════════════════════════════════════════

    async fn rollback(&self, results: &[TransactionResult], disambiguation: Hash) {
        let mined: Vec<Hash> = results
            .iter()
            .filter(|result| result.is_mined())
            .map(|result| result.transaction_id)
            .collect();
        debug!(mined = mined.len(), "rolling back block state");

        if let Err(e) = self
            .ctx
            .chain
            .rollback_state_for_transactions(mined, disambiguation)
            .await
        {
            error!(error = %e, "rollback failed; executor halted until re-initialized");
            self.cancel();
        }
    }

    fn feed_pool(&self, block: &Block) {
        let Some(pool) = &self.pool else {
            return;
        };
        for id in block.body.transaction_ids() {
            match pool.executed_tx(&id) {
                Ok(_) | Err(PoolError::NotFound(_)) => {}
                Err(e) => warn!(tx = %id, error = %e, "pool rejected executed transaction"),
            }
        }
        if let Err(e) = pool.on_new_block_header(&block.header) {
            warn!(error = %e, "pool rejected committed header");
        }
    }
}

/// Results in block order plus the first inconsistency found.
struct OrderedResults {
    results: Vec<TransactionResult>,
    error: Option<StageError>,
}

/// Match engine traces to the block's transactions.
///
/// Traces may arrive in any order; results follow the block, indexed by
/// position. Results are produced for every matched trace even when some
/// transaction has none, so the caller can roll back what did run.
fn order_results(transactions: &[Transaction], traces: Vec<TransactionTrace>) -> OrderedResults {
    let ids: Vec<Hash> = transactions.iter().map(Transaction::hash).collect();
    let positions: HashMap<Hash, usize> = ids
        .iter()
        .enumerate()
        .map(|(index, id)| (*id, index))
        .collect();

    let mut error = None;
    let mut slots: Vec<Option<TransactionResult>> = vec![None; transactions.len()];
    for trace in traces {
        match positions.get(&trace.transaction_id) {
            Some(&index) => {
                slots[index] = Some(TransactionResult::from_trace(&trace, index as u32));
            }
            None => {
                error = error.or(Some(StageError::UnexpectedTrace(trace.transaction_id)));
            }
        }
    }
    if let Some(index) = slots.iter().position(Option::is_none) {
        error = error.or(Some(StageError::MissingTrace(ids[index])));
    }

    OrderedResults {
        results: slots.into_iter().flatten().collect(),
        error,
    }
}

fn verify_commitment(block: &Block, results: &[TransactionResult]) -> Result<(), StageError> {
    let state_hashes: Vec<Hash> = results.iter().map(|result| result.state_hash).collect();
    let computed = compute_merkle_root(&state_hashes);
    let declared = block.header.merkle_tree_root_of_world_state;
    if computed != declared {
        for result in results {
            trace!(
                tx = %result.transaction_id,
                state_hash = %result.state_hash,
                status = ?result.status,
                "result"
            );
        }
        return Err(StageError::IncorrectStateMerkleTree { computed, declared });
    }
    Ok(())
}
