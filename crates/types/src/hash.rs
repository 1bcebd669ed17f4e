//! Cryptographic hash type and binary Merkle trees using Blake3.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Blake3 digest identifying transactions, blocks and state deltas.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash([u8; 32]);

impl Hash {
    /// Digest length.
    pub const BYTES: usize = 32;

    /// All-zero digest; the root of an empty Merkle tree.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Wrap raw digest bytes without hashing them.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Digest of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    /// Digest of the concatenation of `parts`.
    pub fn from_parts(parts: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for part in parts {
            hasher.update(part);
        }
        Self::from_hasher(hasher)
    }

    /// Finalize a running Blake3 hasher into a `Hash`.
    pub fn from_hasher(hasher: blake3::Hasher) -> Self {
        Self(*hasher.finalize().as_bytes())
    }

    /// Parse 64 hex characters.
    pub fn from_hex(s: &str) -> Result<Self, HexError> {
        let mut digest = [0u8; Self::BYTES];
        if s.len() != Self::BYTES * 2 {
            return Err(HexError::InvalidLength {
                expected: Self::BYTES * 2,
                actual: s.len(),
            });
        }
        hex::decode_to_slice(s, &mut digest).map_err(|_| HexError::InvalidHex)?;
        Ok(Self(digest))
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether the hash starts with `prefix`.
    ///
    /// A prefix longer than the hash never matches. Used to check a
    /// transaction's reference-block prefix against a canonical block hash.
    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        prefix.len() <= Self::BYTES && self.0.starts_with(prefix)
    }

    /// Whether this is [`Hash::ZERO`].
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

/// Root of the binary Merkle tree over `hashes`.
///
/// Each level pairs neighbours as `blake3(left || right)`; a trailing node
/// without a sibling moves up as-is. An empty list has root [`Hash::ZERO`]
/// and a single leaf is its own root.
///
/// ```text
/// a b c d e
/// ab cd e
/// abcd e
/// abcde
/// ```
pub fn compute_merkle_root(hashes: &[Hash]) -> Hash {
    match hashes {
        [] => Hash::ZERO,
        [single] => *single,
        _ => {
            let mut level: Vec<Hash> = hashes.to_vec();
            while level.len() > 1 {
                level = level
                    .chunks(2)
                    .map(|pair| match pair {
                        [left, right] => Hash::from_parts(&[left.as_bytes(), right.as_bytes()]),
                        [odd] => *odd,
                        _ => unreachable!("chunks(2) yields one or two items"),
                    })
                    .collect();
            }
            level[0]
        }
    }
}

/// A binary Merkle tree kept alongside its leaves.
///
/// Blocks persist two of these: one over the transaction ids of the body and
/// one over the transaction roots of the indexed side-chain blocks.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BinaryMerkleTree {
    /// Ordered leaves.
    pub leaves: Vec<Hash>,
    /// Root over `leaves`, see [`compute_merkle_root`].
    pub root: Hash,
}

impl BinaryMerkleTree {
    /// Build a tree over the given leaves.
    pub fn from_leaves(leaves: Vec<Hash>) -> Self {
        let root = compute_merkle_root(&leaves);
        Self { leaves, root }
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Whether the tree has no leaves.
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A hex string that is not a digest.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HexError {
    /// Wrong number of characters.
    #[error("hash hex must be {expected} characters, got {actual}")]
    InvalidLength {
        /// Required character count.
        expected: usize,
        /// Characters supplied.
        actual: usize,
    },

    /// A character outside `[0-9a-fA-F]`.
    #[error("hash hex contains a non-hex character")]
    InvalidHex,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_parsing() {
        let digest = Hash::from_parts(&[b"block", b"7"]);
        assert_eq!(Hash::from_hex(&digest.to_hex()), Ok(digest));
        assert_eq!(
            Hash::from_hex("00ff"),
            Err(HexError::InvalidLength {
                expected: 64,
                actual: 4
            })
        );
        assert_eq!(Hash::from_hex(&"zz".repeat(32)), Err(HexError::InvalidHex));
    }

    #[test]
    fn test_from_parts_is_concatenation() {
        assert_eq!(Hash::from_parts(&[b"ab", b"c"]), Hash::from_bytes(b"abc"));
        assert!(!Hash::from_bytes(b"").is_zero());
    }

    #[test]
    fn test_starts_with() {
        let digest = Hash::from_bytes(b"block");
        assert!(digest.starts_with(&digest.as_bytes()[..4]));
        assert!(digest.starts_with(&[]));
        assert!(!digest.starts_with(&[digest.as_bytes()[0].wrapping_add(1)]));
        assert!(!digest.starts_with(&[0u8; 33]));
    }

    #[test]
    fn test_merkle_root_trivial_cases() {
        assert_eq!(compute_merkle_root(&[]), Hash::ZERO);
        let leaf = Hash::from_bytes(b"leaf");
        assert_eq!(compute_merkle_root(&[leaf]), leaf);
    }

    #[test]
    fn test_merkle_root_promotes_unpaired_node() {
        let [a, b, c] = [b"a", b"b", b"c"].map(|s| Hash::from_bytes(s));
        let ab = Hash::from_parts(&[a.as_bytes(), b.as_bytes()]);

        assert_eq!(
            compute_merkle_root(&[a, b, c]),
            Hash::from_parts(&[ab.as_bytes(), c.as_bytes()])
        );
        assert_ne!(compute_merkle_root(&[a, b]), compute_merkle_root(&[b, a]));
    }

    #[test]
    fn test_binary_merkle_tree_root_matches() {
        let leaves: Vec<Hash> = (0..5u8).map(|i| Hash::from_bytes(&[i])).collect();
        let tree = BinaryMerkleTree::from_leaves(leaves.clone());
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.root, compute_merkle_root(&leaves));
        assert!(BinaryMerkleTree::default().is_empty());
    }
}
