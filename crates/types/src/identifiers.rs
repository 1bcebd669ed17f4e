//! Identifier newtypes.

use crate::Hash;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Height of a block in a chain (genesis = 0).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct BlockHeight(pub u64);

impl BlockHeight {
    /// Height of the genesis block.
    pub const GENESIS: Self = Self(0);

    /// The height directly after this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Number of blocks from `earlier` up to `self`, zero if `earlier` is ahead.
    pub fn blocks_since(self, earlier: BlockHeight) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for BlockHeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a chain (main chain or one of its side chains).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ChainId(pub u32);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account or contract address.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// Deterministic address of a system contract on a chain.
    pub fn system_contract(chain_id: ChainId, name: &str) -> Self {
        let hash = Hash::from_parts(&[
            b"system-contract",
            &chain_id.0.to_le_bytes(),
            name.as_bytes(),
        ]);
        Self(*hash.as_bytes())
    }

    /// Address derived from arbitrary public key bytes.
    pub fn from_public_key(public_key: &[u8]) -> Self {
        Self(*Hash::from_bytes(public_key).as_bytes())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", &hex::encode(self.0)[..12])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_since_saturates() {
        assert_eq!(BlockHeight(10).blocks_since(BlockHeight(4)), 6);
        assert_eq!(BlockHeight(4).blocks_since(BlockHeight(10)), 0);
        assert_eq!(BlockHeight(4).next(), BlockHeight(5));
    }

    #[test]
    fn test_system_contract_is_chain_scoped() {
        let a = Address::system_contract(ChainId(1), "CrossChain");
        let b = Address::system_contract(ChainId(2), "CrossChain");
        let c = Address::system_contract(ChainId(1), "Consensus");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, Address::system_contract(ChainId(1), "CrossChain"));
    }
}
