//! Node configuration.

use meridian_execution::ExecutorConfig;
use meridian_mempool::PoolConfig;
use meridian_types::ChainId;
use serde::Deserialize;
use thiserror::Error;

/// Default capacity of the driver's input channel.
pub const DEFAULT_INPUT_BUFFER: usize = 1024;

/// Default number of times a failed block is executed again before the
/// driver drops it.
pub const DEFAULT_MAX_BLOCK_RETRIES: u32 = 8;

/// Errors loading a [`NodeConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML could not be parsed into a config.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// Configuration for one node.
///
/// Bundles the sub-component configs so a runner can load a single file:
///
/// ```toml
/// chain_id = 9992731
/// input_buffer = 256
/// max_block_retries = 3
///
/// [pool]
/// reference_block_valid_period = 64
///
/// [executor]
/// execution_timeout_ms = 4000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NodeConfig {
    /// Chain this node follows.
    pub chain_id: ChainId,

    /// Transaction pool settings.
    #[serde(default)]
    pub pool: PoolConfig,

    /// Block executor settings.
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Capacity of the driver's input channel.
    #[serde(default = "default_input_buffer")]
    pub input_buffer: usize,

    /// Executions of a failed block after the first, before it is dropped.
    ///
    /// Blocks that fail deterministically are dropped on the first failure.
    #[serde(default = "default_max_block_retries")]
    pub max_block_retries: u32,
}

fn default_input_buffer() -> usize {
    DEFAULT_INPUT_BUFFER
}

fn default_max_block_retries() -> u32 {
    DEFAULT_MAX_BLOCK_RETRIES
}

impl NodeConfig {
    /// Config for `chain_id` with every other setting at its default.
    pub fn new(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            pool: PoolConfig::default(),
            executor: ExecutorConfig::default(),
            input_buffer: DEFAULT_INPUT_BUFFER,
            max_block_retries: DEFAULT_MAX_BLOCK_RETRIES,
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: NodeConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that parse but cannot be used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input_buffer == 0 {
            return Err(ConfigError::Invalid {
                field: "input_buffer",
                reason: "must be at least 1",
            });
        }
        if self.pool.validation_batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "pool.validation_batch_size",
                reason: "must be at least 1",
            });
        }
        if self.executor.execution_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid {
                field: "executor.execution_timeout_ms",
                reason: "must be positive when set",
            });
        }
        Ok(())
    }
}
