//! Drives the node state machine with blocks and events.
//!
//! # Driving modes
//!
//! - **Channel**: [`NodeDriver::run`] consumes [`NodeInput`]s from a tokio
//!   channel until shutdown.
//! - **Direct**: tests and embedding runners call [`NodeDriver::step`] per
//!   input.
//!
//! After every input the driver advances as far as it can: while the node
//! is idle it takes the next queued block through validation, execution and
//! appending. Blocks that arrive while the node mines or reverts wait in the
//! queue.
//!
//! # Failed blocks
//!
//! A block whose execution fails stays at the head of the queue and the node
//! waits in `ExecutingLoop`, trying it again on every input. The block is
//! dropped, and the node settles back in `Catching`/`Caught`, when:
//!
//! - the failure is final: the result `cannot_execute`, or the block itself
//!   is at fault (state mismatch, rejected cross-chain entry);
//! - it failed more than [`NodeConfig::max_block_retries`] times in a row;
//! - it no longer extends the chain head.
//!
//! Blocks queued behind it are then processed in order.

use crate::{NodeConfig, NodeState, NodeStateMachine, StateEvent, StateObserver};
use meridian_execution::{BlockExecutor, ExecutionReport};
use meridian_mempool::TransactionLifecycleStore;
use meridian_storage::{ChainStore, StorageError};
use meridian_types::{Block, BlockHeader, ChainId};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Input to the driver.
#[derive(Debug, Clone)]
pub enum NodeInput {
    /// Feed an event to the state machine as-is.
    Event(StateEvent),
    /// A block received from the network.
    Block(Block),
    /// The best chain switched to the fork headed by this header.
    ///
    /// Queued blocks are dropped and validated pool transactions are sent
    /// back for revalidation.
    ForkSwitched(BlockHeader),
}

/// Outcome of the structural header checks.
#[derive(Debug)]
enum HeaderCheck {
    Valid,
    Invalid(&'static str),
}

/// Owns the state machine and turns its decisions into calls on the
/// executor and the pool.
pub struct NodeDriver {
    chain_id: ChainId,
    fsm: NodeStateMachine,
    executor: Arc<BlockExecutor>,
    chain: Arc<dyn ChainStore>,
    pool: Option<Arc<TransactionLifecycleStore>>,
    queue: VecDeque<Block>,
    max_block_retries: u32,
    /// Failed executions of the block at the head of the queue.
    head_failures: u32,
}

impl NodeDriver {
    /// Create a driver. `executor` must already be initialized.
    pub fn new(config: &NodeConfig, executor: Arc<BlockExecutor>, chain: Arc<dyn ChainStore>) -> Self {
        Self {
            chain_id: config.chain_id,
            fsm: NodeStateMachine::new(),
            executor,
            chain,
            pool: None,
            queue: VecDeque::new(),
            max_block_retries: config.max_block_retries,
            head_failures: 0,
        }
    }

    /// Reset `pool` on fork switches.
    pub fn with_pool(mut self, pool: Arc<TransactionLifecycleStore>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Register a hook for state changes.
    pub fn add_observer(&mut self, observer: Arc<dyn StateObserver>) {
        self.fsm.add_observer(observer);
    }

    /// Input channel sized for `config`.
    pub fn channel(config: &NodeConfig) -> (mpsc::Sender<NodeInput>, mpsc::Receiver<NodeInput>) {
        mpsc::channel(config.input_buffer)
    }

    /// Current node state.
    pub fn state(&self) -> NodeState {
        self.fsm.state()
    }

    /// Blocks waiting to be processed.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Process inputs until `shutdown` fires or every sender is dropped.
    ///
    /// Returns the state the node stopped in.
    pub async fn run(
        mut self,
        mut inputs: mpsc::Receiver<NodeInput>,
        shutdown: CancellationToken,
    ) -> NodeState {
        info!(chain_id = self.chain_id.0, "node driver started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                input = inputs.recv() => match input {
                    Some(input) => self.step(input).await,
                    None => break,
                },
            }
        }
        info!(state = %self.state(), queued = self.queue.len(), "node driver stopped");
        self.state()
    }

    /// Apply one input and advance as far as possible.
    pub async fn step(&mut self, input: NodeInput) {
        match input {
            NodeInput::Event(event) => {
                self.fsm.process(event);
            }
            NodeInput::Block(block) => {
                debug!(height = block.height().0, "block queued");
                self.queue.push_back(block);
            }
            NodeInput::ForkSwitched(header) => self.switch_fork(&header),
        }
        self.advance().await;
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Block processing
    // ═══════════════════════════════════════════════════════════════════════

    async fn advance(&mut self) {
        loop {
            let progressed = match self.fsm.state() {
                NodeState::Catching | NodeState::Caught => self.process_next_block().await,
                NodeState::ExecutingLoop => self.retry_head_block().await,
                _ => false,
            };
            if !progressed {
                break;
            }
        }
    }

    /// Take the next queued block through validation and execution.
    ///
    /// Returns whether the node is idle again and may continue.
    async fn process_next_block(&mut self) -> bool {
        let Some(block) = self.queue.pop_front() else {
            return false;
        };
        self.fsm.process(StateEvent::ValidBlockHeader);

        match self.check_header(&block).await {
            Ok(HeaderCheck::Valid) => {}
            Ok(HeaderCheck::Invalid(reason)) => {
                warn!(height = block.height().0, reason, "block rejected");
                self.fsm.process(StateEvent::InvalidBlock);
                return true;
            }
            Err(e) => {
                warn!(height = block.height().0, error = %e, "cannot read chain head");
                self.queue.push_front(block);
                self.fsm.process(StateEvent::InvalidBlock);
                return false;
            }
        }

        self.fsm.process(StateEvent::ValidBlock);
        let report = self.executor.execute_block_report(Some(&block)).await;
        if report.result.is_success() {
            self.append();
            return true;
        }
        self.fsm.process(StateEvent::StateNotUpdated);
        self.handle_failure(block, report)
    }

    /// In `ExecutingLoop`: try the head block again.
    async fn retry_head_block(&mut self) -> bool {
        let Some(block) = self.queue.pop_front() else {
            return false;
        };
        match self.check_header(&block).await {
            Ok(HeaderCheck::Valid) => {}
            Ok(HeaderCheck::Invalid(reason)) => {
                warn!(height = block.height().0, reason, "dropping queued block");
                self.drop_head();
                return true;
            }
            Err(e) => {
                warn!(height = block.height().0, error = %e, "cannot read chain head");
                self.queue.push_front(block);
                return false;
            }
        }

        let report = self.executor.execute_block_report(Some(&block)).await;
        if report.result.is_success() {
            self.append();
            return true;
        }
        self.handle_failure(block, report)
    }

    fn append(&mut self) {
        self.head_failures = 0;
        self.fsm.process(StateEvent::StateUpdated);
        self.fsm.process(StateEvent::BlockAppended);
    }

    /// Keep `block` at the head of the queue or drop it.
    ///
    /// Returns whether the block was dropped, which settles the node again.
    fn handle_failure(&mut self, block: Block, report: ExecutionReport) -> bool {
        self.head_failures += 1;
        let drop_reason = if report.is_final_failure() {
            Some("block cannot succeed")
        } else if self.head_failures > self.max_block_retries {
            Some("retry limit reached")
        } else {
            None
        };

        let height = block.height().0;
        let result = report.result;
        let cause = report.cause.map(|cause| cause.as_str());
        match drop_reason {
            Some(reason) => {
                warn!(
                    height,
                    %result,
                    cause,
                    attempts = self.head_failures,
                    reason,
                    "dropping block"
                );
                self.drop_head();
                true
            }
            None => {
                debug!(
                    height,
                    %result,
                    cause,
                    attempts = self.head_failures,
                    "block kept for retry"
                );
                self.queue.push_front(block);
                false
            }
        }
    }

    /// Leave `ExecutingLoop` after its head block was discarded.
    fn drop_head(&mut self) {
        self.head_failures = 0;
        self.fsm.process(StateEvent::InvalidBlock);
    }

    async fn check_header(&self, block: &Block) -> Result<HeaderCheck, StorageError> {
        let header = &block.header;
        if header.chain_id != self.chain_id {
            return Ok(HeaderCheck::Invalid("wrong chain"));
        }
        let head = self.chain.current_height().await?;
        if header.height != head.next() {
            return Ok(HeaderCheck::Invalid("not the next height"));
        }
        if let Some(head_hash) = self.chain.block_hash_by_height(head).await? {
            if header.previous_block_hash != head_hash {
                return Ok(HeaderCheck::Invalid("does not extend the head"));
            }
        }
        Ok(HeaderCheck::Valid)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Fork handling
    // ═══════════════════════════════════════════════════════════════════════

    #[instrument(skip(self, header), fields(height = header.height.0))]
    fn switch_fork(&mut self, header: &BlockHeader) {
        if self.fsm.process(StateEvent::ForkDetected) != NodeState::Reverting {
            warn!(state = %self.state(), "fork switch ignored");
            return;
        }
        let dropped = self.queue.len();
        self.queue.clear();
        self.head_failures = 0;
        if let Some(pool) = &self.pool {
            pool.on_switched_fork(header);
        }
        self.fsm.process(StateEvent::RollbackFinished);
        info!(dropped, "switched fork");
    }
}
