//! Pool configuration.

use serde::Deserialize;
use std::time::Duration;

/// Default number of blocks a reference block stays valid for.
pub const DEFAULT_REFERENCE_BLOCK_VALID_PERIOD: u64 = 512;

/// Default number of blocks executed transactions are kept after inclusion.
pub const DEFAULT_EXECUTED_RETENTION_BLOCKS: u64 = 4;

/// Default number of transactions a validation pass claims.
pub const DEFAULT_VALIDATION_BATCH_SIZE: usize = 128;

/// Default pause between validation passes.
pub const DEFAULT_VALIDATION_INTERVAL_MS: u64 = 50;

/// Transaction pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PoolConfig {
    /// How many blocks behind the chain head a reference block may be.
    ///
    /// Validated transactions anchored further back become `Expired`, and
    /// validation rejects them outright.
    #[serde(default = "default_reference_block_valid_period")]
    pub reference_block_valid_period: u64,

    /// Blocks an `Executed` (or otherwise retired) transaction is kept before
    /// it is purged from the pool.
    #[serde(default = "default_executed_retention_blocks")]
    pub executed_retention_blocks: u64,

    /// Maximum transactions claimed per validation pass.
    #[serde(default = "default_validation_batch_size")]
    pub validation_batch_size: usize,

    /// Pause between validation passes, in milliseconds.
    #[serde(default = "default_validation_interval_ms")]
    pub validation_interval_ms: u64,
}

fn default_reference_block_valid_period() -> u64 {
    DEFAULT_REFERENCE_BLOCK_VALID_PERIOD
}

fn default_executed_retention_blocks() -> u64 {
    DEFAULT_EXECUTED_RETENTION_BLOCKS
}

fn default_validation_batch_size() -> usize {
    DEFAULT_VALIDATION_BATCH_SIZE
}

fn default_validation_interval_ms() -> u64 {
    DEFAULT_VALIDATION_INTERVAL_MS
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            reference_block_valid_period: DEFAULT_REFERENCE_BLOCK_VALID_PERIOD,
            executed_retention_blocks: DEFAULT_EXECUTED_RETENTION_BLOCKS,
            validation_batch_size: DEFAULT_VALIDATION_BATCH_SIZE,
            validation_interval_ms: DEFAULT_VALIDATION_INTERVAL_MS,
        }
    }
}

impl PoolConfig {
    /// Pause between validation passes.
    pub fn validation_interval(&self) -> Duration {
        Duration::from_millis(self.validation_interval_ms)
    }
}
