//! Node control state machine.
//!
//! The state machine only decides what the node does next. It performs no
//! I/O: the [`NodeDriver`](crate::NodeDriver) watches the current state and
//! calls the block executor, the pool and consensus collaborators.
//!
//! ```text
//!             ValidBlockHeader            ValidBlock
//! Catching ─────────────────► BlockValidating ─────► BlockExecuting
//!  Caught  ◄──── InvalidBlock ────┘                   │         │
//!    ▲                                   StateUpdated │         │ StateNotUpdated
//!    │         BlockAppended                          ▼         ▼
//!    └──────────────────────────────── BlockAppending ◄─── ExecutingLoop
//!                                                      StateUpdated
//!
//! Catching/Caught/ExecutingLoop ── MiningStart ──► GeneratingConsensusTx
//!   ── ConsensusTxGenerated ──► ProducingBlock ── MiningEnd ──► Caught
//!
//! Catching/Caught/ExecutingLoop ── ForkDetected ──► Reverting
//!   ── RollbackFinished ──► Catching
//!
//! ExecutingLoop ── InvalidBlock ──► Catching/Caught (failed block dropped)
//! ```

use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// What the node is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    /// Syncing blocks, not yet known to be at the network head.
    Catching,
    /// Idle at the network head.
    Caught,
    /// Checking a received block before execution.
    BlockValidating,
    /// Running the block executor on a received block.
    BlockExecuting,
    /// Writing an executed block to the chain.
    BlockAppending,
    /// Building consensus transactions for a block this node produces.
    GeneratingConsensusTx,
    /// Producing a block.
    ProducingBlock,
    /// Retrying a block whose execution did not update state.
    ExecutingLoop,
    /// Undoing state after a fork switch.
    Reverting,
}

impl NodeState {
    /// Every state.
    pub const ALL: [NodeState; 9] = [
        NodeState::Catching,
        NodeState::Caught,
        NodeState::BlockValidating,
        NodeState::BlockExecuting,
        NodeState::BlockAppending,
        NodeState::GeneratingConsensusTx,
        NodeState::ProducingBlock,
        NodeState::ExecutingLoop,
        NodeState::Reverting,
    ];

    /// Whether the node is producing a block of its own.
    pub fn is_mining(&self) -> bool {
        matches!(
            self,
            NodeState::GeneratingConsensusTx | NodeState::ProducingBlock
        )
    }

    /// Whether the node is waiting for work and may take the next block.
    pub fn is_idle(&self) -> bool {
        matches!(self, NodeState::Catching | NodeState::Caught)
    }

    /// String representation for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeState::Catching => "Catching",
            NodeState::Caught => "Caught",
            NodeState::BlockValidating => "BlockValidating",
            NodeState::BlockExecuting => "BlockExecuting",
            NodeState::BlockAppending => "BlockAppending",
            NodeState::GeneratingConsensusTx => "GeneratingConsensusTx",
            NodeState::ProducingBlock => "ProducingBlock",
            NodeState::ExecutingLoop => "ExecutingLoop",
            NodeState::Reverting => "Reverting",
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signals fed to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateEvent {
    /// A block header passed the network-level checks.
    ValidBlockHeader,
    /// This node's turn to produce a block.
    MiningStart,
    /// The best chain switched to another fork.
    ForkDetected,
    /// The block under validation is acceptable.
    ValidBlock,
    /// The block under validation was rejected.
    InvalidBlock,
    /// Executing the block updated the world state.
    StateUpdated,
    /// Executing the block left the world state unchanged.
    StateNotUpdated,
    /// The executed block is on the chain.
    BlockAppended,
    /// Consensus transactions for the produced block are ready.
    ConsensusTxGenerated,
    /// Block production finished.
    MiningEnd,
    /// Fork rollback finished.
    RollbackFinished,
}

impl StateEvent {
    /// Every event.
    pub const ALL: [StateEvent; 11] = [
        StateEvent::ValidBlockHeader,
        StateEvent::MiningStart,
        StateEvent::ForkDetected,
        StateEvent::ValidBlock,
        StateEvent::InvalidBlock,
        StateEvent::StateUpdated,
        StateEvent::StateNotUpdated,
        StateEvent::BlockAppended,
        StateEvent::ConsensusTxGenerated,
        StateEvent::MiningEnd,
        StateEvent::RollbackFinished,
    ];

    /// String representation for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            StateEvent::ValidBlockHeader => "ValidBlockHeader",
            StateEvent::MiningStart => "MiningStart",
            StateEvent::ForkDetected => "ForkDetected",
            StateEvent::ValidBlock => "ValidBlock",
            StateEvent::InvalidBlock => "InvalidBlock",
            StateEvent::StateUpdated => "StateUpdated",
            StateEvent::StateNotUpdated => "StateNotUpdated",
            StateEvent::BlockAppended => "BlockAppended",
            StateEvent::ConsensusTxGenerated => "ConsensusTxGenerated",
            StateEvent::MiningEnd => "MiningEnd",
            StateEvent::RollbackFinished => "RollbackFinished",
        }
    }
}

impl fmt::Display for StateEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The transition table.
///
/// `caught` records whether the node has ever been caught up or started
/// mining. Returns the next state and the updated flag, or `None` when the
/// table has no entry for the pair.
pub fn next_state(
    state: NodeState,
    caught: bool,
    event: StateEvent,
) -> Option<(NodeState, bool)> {
    use NodeState::*;
    use StateEvent::*;

    let settled = if caught { Caught } else { Catching };
    let next = match (state, event) {
        (Catching | Caught, ValidBlockHeader) => BlockValidating,
        (Catching | Caught | ExecutingLoop, MiningStart) => {
            return Some((GeneratingConsensusTx, true));
        }
        (Catching | Caught | ExecutingLoop, ForkDetected) => Reverting,
        (BlockValidating, ValidBlock) => BlockExecuting,
        (BlockValidating | ExecutingLoop, InvalidBlock) => settled,
        (BlockExecuting | ExecutingLoop, StateUpdated) => BlockAppending,
        (BlockExecuting, StateNotUpdated) => ExecutingLoop,
        (BlockAppending, BlockAppended) => settled,
        (GeneratingConsensusTx, ConsensusTxGenerated) => ProducingBlock,
        (ProducingBlock, MiningEnd) => Caught,
        (Reverting, RollbackFinished) => Catching,
        _ => return None,
    };
    Some((next, caught || next == Caught))
}

/// Hooks invoked on every state change.
pub trait StateObserver: Send + Sync {
    /// Called with the state being left.
    fn on_exit(&self, _state: NodeState) {}

    /// Called with the state being entered.
    fn on_enter(&self, _state: NodeState) {}
}

/// Holds the node's current state and applies events to it.
///
/// Unmodeled `(state, event)` pairs leave the state unchanged and log a
/// warning; processing an event never fails.
pub struct NodeStateMachine {
    state: NodeState,
    caught: bool,
    observers: Vec<Arc<dyn StateObserver>>,
}

impl fmt::Debug for NodeStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeStateMachine")
            .field("state", &self.state)
            .field("caught", &self.caught)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Default for NodeStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeStateMachine {
    /// A node that has just started: `Catching`, never caught up.
    pub fn new() -> Self {
        Self {
            state: NodeState::Catching,
            caught: false,
            observers: Vec::new(),
        }
    }

    /// Register a hook for state changes.
    pub fn add_observer(&mut self, observer: Arc<dyn StateObserver>) {
        self.observers.push(observer);
    }

    /// Current state.
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Whether the node has ever been caught up or mined.
    pub fn is_caught(&self) -> bool {
        self.caught
    }

    /// Apply `event` and return the resulting state.
    pub fn process(&mut self, event: StateEvent) -> NodeState {
        let Some((next, caught)) = next_state(self.state, self.caught, event) else {
            warn!(state = %self.state, %event, "unexpected event for state");
            return self.state;
        };

        self.caught = caught;
        if next != self.state {
            debug!(from = %self.state, to = %next, %event, "node state change");
            for observer in &self.observers {
                observer.on_exit(self.state);
            }
            self.state = next;
            for observer in &self.observers {
                observer.on_enter(next);
            }
        }
        self.state
    }
}
