//! Node control for the Meridian block-processing core.
//!
//! [`NodeStateMachine`] decides what the node does next from the events it
//! sees; [`NodeDriver`] feeds it blocks and events and performs the work
//! each state calls for:
//!
//! ```text
//! NodeInput ──► NodeDriver ──► NodeStateMachine (decide)
//!                   │
//!                   ├──► BlockExecutor::execute_block
//!                   └──► TransactionLifecycleStore::on_switched_fork
//! ```

#![warn(missing_docs)]

mod config;
mod driver;
mod state;

pub use config::{ConfigError, NodeConfig, DEFAULT_INPUT_BUFFER, DEFAULT_MAX_BLOCK_RETRIES};
pub use driver::{NodeDriver, NodeInput};
pub use state::{next_state, NodeState, NodeStateMachine, StateEvent, StateObserver};
