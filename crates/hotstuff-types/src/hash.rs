//! `BlockHash`: a fixed-size SHA-256 digest identifying a [`crate::Block`].

use std::fmt::{self, Debug, Display};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const HASH_LENGTH: usize = 32;

/// A SHA-256 digest. Block equality is by hash (§3).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockHash([u8; HASH_LENGTH]);

impl BlockHash {
    /// The `parent_hash` of the genesis block: all zeros.
    pub const GENESIS: BlockHash = BlockHash([0u8; HASH_LENGTH]);

    pub fn from_bytes(bytes: [u8; HASH_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LENGTH] {
        &self.0
    }

    pub fn is_genesis(&self) -> bool {
        self.0 == [0u8; HASH_LENGTH]
    }

    /// Hashes an arbitrary byte stream with SHA-256 into a `BlockHash`.
    pub fn digest(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let out = hasher.finalize();
        let mut buf = [0u8; HASH_LENGTH];
        buf.copy_from_slice(&out);
        Self(buf)
    }
}

impl Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BlockHash({:02x}{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}...)",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5], self.0[6], self.0[7]
        )
    }
}

impl Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_is_all_zero() {
        assert!(BlockHash::GENESIS.is_genesis());
        assert_eq!(BlockHash::GENESIS.as_bytes(), &[0u8; HASH_LENGTH]);
    }

    #[test]
    fn digest_is_deterministic() {
        let a = BlockHash::digest(b"abc");
        let b = BlockHash::digest(b"abc");
        assert_eq!(a, b);
        assert_ne!(a, BlockHash::digest(b"abd"));
    }
}
