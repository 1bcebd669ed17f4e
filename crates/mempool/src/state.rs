//! Transaction lifecycle store.

use crate::holder::TransactionHolder;
use crate::{PoolConfig, PoolError, TxHolderView};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use meridian_storage::TransactionStore;
use meridian_types::{BlockHeader, BlockHeight, Hash, Transaction, TransactionStatus};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument, trace};

use TransactionStatus::*;

type HolderIndex = DashMap<Hash, Arc<TransactionHolder>>;

/// Pool statistics, counted from the holders' status cells.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Transactions in `Received`.
    pub received: usize,
    /// Transactions in `Validating`.
    pub validating: usize,
    /// Transactions in `Validated`.
    pub validated: usize,
    /// Transactions in `Invalid`.
    pub invalid: usize,
    /// Transactions in `Executing`.
    pub executing: usize,
    /// Transactions in `Executed`.
    pub executed: usize,
    /// Transactions in `Expired`.
    pub expired: usize,
    /// All transactions held.
    pub total: usize,
    /// Height of the last block header the pool saw.
    pub current_height: BlockHeight,
}

/// Concurrent store of every non-finalized transaction.
///
/// # Indices
///
/// `all` holds every holder. A holder additionally sits in at most one of:
///
/// - `received`: candidates for validation
/// - `validated`: candidates for execution
/// - `retired`: executed, invalid or expired holders, keyed by the height
///   they retired at, waiting to be purged
///
/// `Validating` and `Executing` holders live only in `all`; whoever claimed
/// them reports back by hash.
///
/// # Lock discipline
///
/// - Moving a holder *into* `received` or `validated` performs the
///   compare-and-swap while holding that index's entry guard.
/// - Moving *out* removes the entry only if the holder no longer has the
///   index's status.
/// - A scan never removes from the map it iterates; it collects the holders
///   it won and removes them after the iterator is dropped.
/// - The only nested guards are `all` then `received`, in `add_new_transaction`.
pub struct TransactionLifecycleStore {
    config: PoolConfig,
    transactions: Arc<dyn TransactionStore>,
    all: HolderIndex,
    received: HolderIndex,
    validated: HolderIndex,
    retired: DashMap<BlockHeight, Vec<Hash>>,
    current_height: AtomicU64,
}

impl TransactionLifecycleStore {
    /// Create an empty pool backed by `transactions` for duplicate detection.
    pub fn new(config: PoolConfig, transactions: Arc<dyn TransactionStore>) -> Self {
        Self {
            config,
            transactions,
            all: DashMap::new(),
            received: DashMap::new(),
            validated: DashMap::new(),
            retired: DashMap::new(),
            current_height: AtomicU64::new(0),
        }
    }

    /// The pool's configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Height of the last block header the pool accepted.
    pub fn current_height(&self) -> BlockHeight {
        BlockHeight(self.current_height.load(Ordering::Acquire))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Ingestion
    // ═══════════════════════════════════════════════════════════════════════

    /// Add a transaction in `Received`.
    ///
    /// Fails with [`PoolError::DuplicateFinalized`] when the durable store
    /// already holds the transaction. Adding a transaction the pool already
    /// tracks is a no-op.
    pub async fn add_new_transaction(&self, transaction: Transaction) -> Result<(), PoolError> {
        let id = transaction.hash();
        if self.transactions.get_transaction(&id).await?.is_some() {
            return Err(PoolError::DuplicateFinalized(id));
        }

        match self.all.entry(id) {
            Entry::Occupied(_) => {
                trace!(tx = %id, "transaction already pooled");
            }
            Entry::Vacant(entry) => {
                let holder = Arc::new(TransactionHolder::new(transaction));
                self.received.insert(id, Arc::clone(&holder));
                entry.insert(holder);
                trace!(tx = %id, "transaction received");
            }
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Validation
    // ═══════════════════════════════════════════════════════════════════════

    /// Claim one `Received` transaction into `Validating`.
    ///
    /// No ordering is guaranteed across calls.
    pub fn get_transaction_for_validation(&self) -> Option<Arc<Transaction>> {
        let claimed = self.received.iter().find_map(|entry| {
            let holder = entry.value();
            holder
                .try_transition(Received, Validating)
                .then(|| Arc::clone(holder))
        })?;
        self.unindex(&self.received, claimed.id(), Received);
        Some(Arc::clone(claimed.transaction()))
    }

    /// `Received -> Validating`.
    ///
    /// Returns `Ok(false)` when the transaction is not `Received`.
    pub fn validating_tx(&self, id: &Hash) -> Result<bool, PoolError> {
        let holder = self.holder(id)?;
        let won = holder.try_transition(Received, Validating);
        if won {
            self.unindex(&self.received, *id, Received);
        }
        Ok(won)
    }

    /// `Validating -> Validated`.
    pub fn validated_tx(&self, id: &Hash) -> Result<bool, PoolError> {
        let holder = self.holder(id)?;
        Ok(self.index(&self.validated, &holder, Validating, Validated))
    }

    /// `Validating -> Invalid`.
    pub fn invalidated_tx(&self, id: &Hash) -> Result<bool, PoolError> {
        let holder = self.holder(id)?;
        let won = holder.try_transition(Validating, Invalid);
        if won {
            self.retire(self.current_height(), *id);
        }
        Ok(won)
    }

    /// Number of transactions waiting for execution.
    pub fn validated_count(&self) -> usize {
        self.validated.len()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Execution
    // ═══════════════════════════════════════════════════════════════════════

    /// Claim up to `count` `Validated` transactions into `Executing`.
    pub fn get_txs_for_execution(&self, count: usize) -> Vec<Arc<Transaction>> {
        if count == 0 {
            return vec![];
        }
        let claimed: Vec<Arc<TransactionHolder>> = self
            .validated
            .iter()
            .filter_map(|entry| {
                let holder = entry.value();
                holder
                    .try_transition(Validated, Executing)
                    .then(|| Arc::clone(holder))
            })
            .take(count)
            .collect();

        claimed
            .into_iter()
            .map(|holder| {
                self.unindex(&self.validated, holder.id(), Validated);
                Arc::clone(holder.transaction())
            })
            .collect()
    }

    /// `Executing -> Validated`, for a tentative block that was abandoned.
    pub fn revert_executing_tx(&self, id: &Hash) -> Result<bool, PoolError> {
        let holder = self.holder(id)?;
        Ok(self.index(&self.validated, &holder, Executing, Validated))
    }

    /// `Executing -> Executed`, attributed to the block being built
    /// (current height + 1).
    pub fn executed_tx(&self, id: &Hash) -> Result<bool, PoolError> {
        let holder = self.holder(id)?;
        let won = holder.try_transition(Executing, Executed);
        if won {
            let height = self.current_height().next();
            holder.set_executed_height(height);
            self.retire(height, *id);
        }
        Ok(won)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Chain events
    // ═══════════════════════════════════════════════════════════════════════

    /// Advance to `header`'s height: expire stale validated transactions and
    /// purge retired ones that fell out of the retention window.
    ///
    /// Headers must arrive in sequence; only a pool still at height 0 accepts
    /// any height.
    #[instrument(skip(self, header), fields(height = header.height.0))]
    pub fn on_new_block_header(&self, header: &BlockHeader) -> Result<(), PoolError> {
        let height = header.height;
        let current = self.current_height();
        if current != BlockHeight::GENESIS && height != current.next() {
            return Err(PoolError::UnexpectedHeight {
                current,
                received: height,
            });
        }
        if self
            .current_height
            .compare_exchange(current.0, height.0, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(PoolError::UnexpectedHeight {
                current: self.current_height(),
                received: height,
            });
        }

        let expired = self.expire_validated(height);
        let purged = self.purge_retired(height);
        if expired > 0 || purged > 0 {
            debug!(expired, purged, "pool swept");
        }
        Ok(())
    }

    /// Send every validated transaction back to `Received` and move to the
    /// fork's head.
    #[instrument(skip(self, header), fields(height = header.height.0))]
    pub fn on_switched_fork(&self, header: &BlockHeader) {
        let holders: Vec<Arc<TransactionHolder>> = self
            .validated
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut reset = 0usize;
        for holder in holders {
            if self.index(&self.received, &holder, Validated, Received) {
                reset += 1;
            }
            self.unindex(&self.validated, holder.id(), Validated);
        }

        self.current_height
            .store(header.height.0, Ordering::Release);
        debug!(reset, "validated transactions returned for revalidation");
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════════

    /// Read-only view of a pooled transaction.
    pub fn get_tx_holder_view(&self, id: &Hash) -> Option<TxHolderView> {
        self.all.get(id).map(|holder| holder.view())
    }

    /// Whether the pool holds `id`.
    pub fn contains(&self, id: &Hash) -> bool {
        self.all.contains_key(id)
    }

    /// Number of transactions held.
    pub fn len(&self) -> usize {
        self.all.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Count transactions by status.
    ///
    /// Walks every holder; intended for monitoring, not hot paths.
    pub fn stats(&self) -> PoolStats {
        let mut stats = PoolStats {
            current_height: self.current_height(),
            ..PoolStats::default()
        };
        for entry in self.all.iter() {
            stats.total += 1;
            match entry.value().status() {
                Received => stats.received += 1,
                Validating => stats.validating += 1,
                Validated => stats.validated += 1,
                Invalid => stats.invalid += 1,
                Executing => stats.executing += 1,
                Executed => stats.executed += 1,
                Expired => stats.expired += 1,
            }
        }
        stats
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Internals
    // ═══════════════════════════════════════════════════════════════════════

    fn holder(&self, id: &Hash) -> Result<Arc<TransactionHolder>, PoolError> {
        self.all
            .get(id)
            .map(|holder| Arc::clone(holder.value()))
            .ok_or(PoolError::NotFound(*id))
    }

    /// Transition `from -> to` and insert into `index` under its entry guard.
    fn index(
        &self,
        index: &HolderIndex,
        holder: &Arc<TransactionHolder>,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> bool {
        let entry = index.entry(holder.id());
        if !holder.try_transition(from, to) {
            return false;
        }
        entry.insert(Arc::clone(holder));
        true
    }

    /// Drop `id` from `index` unless it is (again) at `status`.
    fn unindex(&self, index: &HolderIndex, id: Hash, status: TransactionStatus) {
        index.remove_if(&id, |_, holder| holder.status() != status);
    }

    fn retire(&self, height: BlockHeight, id: Hash) {
        self.retired.entry(height).or_default().push(id);
    }

    fn expire_validated(&self, height: BlockHeight) -> usize {
        let period = self.config.reference_block_valid_period;
        if height.0 <= period {
            return 0;
        }
        let expired: Vec<Hash> = self
            .validated
            .iter()
            .filter_map(|entry| {
                let holder = entry.value();
                let age = height.blocks_since(holder.transaction().ref_block_number);
                (age > period && holder.try_transition(Validated, Expired)).then(|| holder.id())
            })
            .collect();

        for id in &expired {
            self.unindex(&self.validated, *id, Validated);
            self.retire(height, *id);
        }
        expired.len()
    }

    fn purge_retired(&self, height: BlockHeight) -> usize {
        let retention = self.config.executed_retention_blocks;
        let due: Vec<BlockHeight> = self
            .retired
            .iter()
            .map(|entry| *entry.key())
            .filter(|retired_at| retired_at.0.saturating_add(retention) <= height.0)
            .collect();

        let mut purged = 0;
        for retired_at in due {
            let Some((_, ids)) = self.retired.remove(&retired_at) else {
                continue;
            };
            for id in ids {
                if self
                    .all
                    .remove_if(&id, |_, holder| holder.status().is_final())
                    .is_some()
                {
                    purged += 1;
                }
            }
        }
        purged
    }
}
