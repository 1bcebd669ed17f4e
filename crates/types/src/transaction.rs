//! Transaction payloads and their lifecycle status.

use crate::{
    Address, BlockHeight, ChainId, Hash, ParentChainBlockInfo, CROSS_CHAIN_CONTRACT,
    RECORD_PARENT_CHAIN_METHOD,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An immutable transaction payload.
///
/// Identified by [`Transaction::hash`], the Blake3 digest of its canonical
/// bincode encoding. A transaction is anchored to a reference block: it is
/// only valid while that block is canonical and recent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sender.
    pub from: Address,
    /// Target contract.
    pub to: Address,
    /// Contract method to invoke.
    pub method_name: String,
    /// Encoded method parameters.
    pub params: Vec<u8>,
    /// Height of the reference block.
    pub ref_block_number: BlockHeight,
    /// Leading bytes of the reference block's hash.
    pub ref_block_prefix: Vec<u8>,
}

impl Transaction {
    /// Compute the transaction id.
    pub fn hash(&self) -> Hash {
        let bytes = bincode::serialize(self).expect("Transaction serialization should never fail");
        Hash::from_bytes(&bytes)
    }

    /// Build the transaction that indexes a parent-chain block into `chain_id`.
    pub fn index_parent_chain(
        chain_id: ChainId,
        from: Address,
        info: &ParentChainBlockInfo,
        ref_block_number: BlockHeight,
        ref_block_prefix: Vec<u8>,
    ) -> Self {
        Self {
            from,
            to: Address::system_contract(chain_id, CROSS_CHAIN_CONTRACT),
            method_name: RECORD_PARENT_CHAIN_METHOD.to_string(),
            params: bincode::serialize(info)
                .expect("ParentChainBlockInfo serialization should never fail"),
            ref_block_number,
            ref_block_prefix,
        }
    }

    /// Whether this transaction indexes parent-chain block info on `chain_id`.
    pub fn is_parent_chain_indexing(&self, chain_id: ChainId) -> bool {
        self.method_name == RECORD_PARENT_CHAIN_METHOD
            && self.to == Address::system_contract(chain_id, CROSS_CHAIN_CONTRACT)
    }

    /// Decode the parent-chain block info carried by an indexing transaction.
    ///
    /// Returns `Ok(None)` for transactions of any other kind.
    pub fn parent_chain_block_info(
        &self,
        chain_id: ChainId,
    ) -> Result<Option<ParentChainBlockInfo>, PayloadError> {
        if !self.is_parent_chain_indexing(chain_id) {
            return Ok(None);
        }
        bincode::deserialize(&self.params)
            .map(Some)
            .map_err(|e| PayloadError(e.to_string()))
    }
}

/// A transaction payload could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed transaction payload: {0}")]
pub struct PayloadError(pub String);

/// Stage of a transaction in the lifecycle store.
///
/// ```text
/// Received ──► Validating ──► Validated ──► Executing ──► Executed
///    ▲              │             │  ▲           │
///    │              ▼             │  └───────────┘ (abandoned block)
///    │           Invalid          ▼
///    └──────── (fork) ──────── Expired
/// ```
///
/// Stored as a `u8` inside an atomic cell, so every variant has a fixed
/// discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransactionStatus {
    /// First observed, not yet validated.
    Received = 0,
    /// Claimed by a validator.
    Validating = 1,
    /// Passed validation; eligible for execution.
    Validated = 2,
    /// Failed validation (terminal).
    Invalid = 3,
    /// Claimed by the block producer.
    Executing = 4,
    /// Included in a block (terminal until pruned).
    Executed = 5,
    /// Reference block left the validity window (terminal).
    Expired = 6,
}

impl TransactionStatus {
    /// All statuses in discriminant order.
    pub const ALL: [TransactionStatus; 7] = [
        TransactionStatus::Received,
        TransactionStatus::Validating,
        TransactionStatus::Validated,
        TransactionStatus::Invalid,
        TransactionStatus::Executing,
        TransactionStatus::Executed,
        TransactionStatus::Expired,
    ];

    /// Recover a status from its discriminant.
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    /// Whether no further transition leaves this status.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Invalid | TransactionStatus::Executed | TransactionStatus::Expired
        )
    }

    /// Whether the lifecycle graph has an edge `self -> to`.
    pub fn can_transition_to(&self, to: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, to),
            (Received, Validating)
                | (Validating, Validated)
                | (Validating, Invalid)
                | (Validated, Executing)
                | (Validated, Expired)
                | (Validated, Received)
                | (Executing, Validated)
                | (Executing, Executed)
        )
    }

    /// Lower-case name, as used in logs and config.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Received => "received",
            TransactionStatus::Validating => "validating",
            TransactionStatus::Validated => "validated",
            TransactionStatus::Invalid => "invalid",
            TransactionStatus::Executing => "executing",
            TransactionStatus::Executed => "executed",
            TransactionStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = TransactionStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| TransactionStatusParseError(s.to_string()))
    }
}

/// Error parsing a [`TransactionStatus`] from a string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown transaction status: {0}")]
pub struct TransactionStatusParseError(pub String);
