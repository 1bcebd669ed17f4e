//! Reference-block validation.
//!
//! A transaction names a reference block by height and hash prefix. It is
//! valid only while that block is canonical and no more than
//! `reference_block_valid_period` blocks behind the chain head.

use crate::{PoolConfig, PoolError, TransactionLifecycleStore};
use meridian_storage::ChainStore;
use meridian_types::{BlockHeight, Transaction};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcome of checking a transaction's reference block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefBlockStatus {
    /// The reference block is canonical and recent.
    Valid,
    /// No canonical block at that height matches the prefix.
    Invalid,
    /// The reference block is too far behind the chain head.
    Expired,
    /// The reference block is above the chain head.
    Future,
}

impl RefBlockStatus {
    /// Whether the transaction may proceed to execution.
    pub fn is_valid(&self) -> bool {
        matches!(self, RefBlockStatus::Valid)
    }
}

/// Checks reference blocks against the canonical chain.
pub struct RefBlockValidator {
    chain: Arc<dyn ChainStore>,
    valid_period: u64,
}

impl RefBlockValidator {
    /// Create a validator reading canonical hashes from `chain`.
    pub fn new(chain: Arc<dyn ChainStore>, valid_period: u64) -> Self {
        Self {
            chain,
            valid_period,
        }
    }

    /// Classify `transaction`'s reference block.
    ///
    /// A reference to genesis whose prefix matches the genesis hash never
    /// expires.
    pub async fn validate(&self, transaction: &Transaction) -> Result<RefBlockStatus, PoolError> {
        let ref_height = transaction.ref_block_number;
        let prefix = &transaction.ref_block_prefix;

        if ref_height == BlockHeight::GENESIS {
            if let Some(genesis) = self.chain.block_hash_by_height(BlockHeight::GENESIS).await? {
                if genesis.starts_with(prefix) {
                    return Ok(RefBlockStatus::Valid);
                }
            }
        }

        let current = self.chain.current_height().await?;
        if ref_height > current && current > BlockHeight::GENESIS {
            return Ok(RefBlockStatus::Future);
        }
        if current.blocks_since(ref_height) > self.valid_period {
            return Ok(RefBlockStatus::Expired);
        }

        match self.chain.block_hash_by_height(ref_height).await? {
            Some(canonical) if canonical.starts_with(prefix) => Ok(RefBlockStatus::Valid),
            Some(_) => Ok(RefBlockStatus::Invalid),
            None => {
                warn!(
                    ref_height = ref_height.0,
                    current = current.0,
                    "no canonical block at reference height"
                );
                Ok(RefBlockStatus::Invalid)
            }
        }
    }
}

/// Counts from one validation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationOutcome {
    /// Transactions moved to `Validated`.
    pub validated: usize,
    /// Transactions moved to `Invalid`.
    pub invalidated: usize,
}

/// Background worker moving `Received` transactions through validation.
pub struct ValidationWorker {
    pool: Arc<TransactionLifecycleStore>,
    validator: RefBlockValidator,
    batch_size: usize,
    interval: Duration,
}

impl ValidationWorker {
    /// Create a worker for `pool`, checking references against `chain`.
    pub fn new(
        pool: Arc<TransactionLifecycleStore>,
        chain: Arc<dyn ChainStore>,
        config: &PoolConfig,
    ) -> Self {
        Self {
            pool,
            validator: RefBlockValidator::new(chain, config.reference_block_valid_period),
            batch_size: config.validation_batch_size,
            interval: config.validation_interval(),
        }
    }

    /// Claim and validate up to `max` transactions.
    ///
    /// A storage failure while validating marks the transaction invalid; it
    /// can be submitted again once the pool purges it.
    pub async fn run_once(&self, max: usize) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::default();
        for _ in 0..max {
            let Some(transaction) = self.pool.get_transaction_for_validation() else {
                break;
            };
            let id = transaction.hash();

            let status = match self.validator.validate(&transaction).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(tx = %id, error = %e, "reference block lookup failed");
                    RefBlockStatus::Invalid
                }
            };

            let transition = if status.is_valid() {
                self.pool.validated_tx(&id)
            } else {
                debug!(tx = %id, ?status, "transaction rejected");
                self.pool.invalidated_tx(&id)
            };
            match transition {
                Ok(true) if status.is_valid() => outcome.validated += 1,
                Ok(true) => outcome.invalidated += 1,
                Ok(false) => {}
                Err(e) => warn!(tx = %id, error = %e, "validation result dropped"),
            }
        }
        outcome
    }

    /// Validate in batches until `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            batch_size = self.batch_size,
            interval_ms = self.interval.as_millis() as u64,
            "validation worker started"
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let outcome = self.run_once(self.batch_size).await;
                    if outcome != ValidationOutcome::default() {
                        debug!(
                            validated = outcome.validated,
                            invalidated = outcome.invalidated,
                            "validation pass"
                        );
                    }
                }
            }
        }
        info!("validation worker stopped");
    }
}
