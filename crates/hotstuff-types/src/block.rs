//! [`Block`]: a link in the replicated chain.

use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::hash::BlockHash;
use crate::ids::ViewNumber;

/// A block in the append-only chain rooted at genesis.
///
/// `hash = SHA256(cmds ∥ view ∥ parent_hash_or_"genesis")` (§3). Equality
/// and ordering in maps/sets is by hash, not by structural comparison, so
/// `hash` is recomputed at construction time and cached — never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub cmds: Vec<Command>,
    pub parent_hash: Option<BlockHash>,
    pub view: ViewNumber,
    hash: BlockHash,
}

impl Block {
    /// Constructs the genesis block: `cmds=∅, parent=nil, view=0`.
    pub fn genesis() -> Self {
        Self::new(Vec::new(), None, ViewNumber::GENESIS)
    }

    /// Constructs a new block and computes its hash from its contents.
    pub fn new(cmds: Vec<Command>, parent_hash: Option<BlockHash>, view: ViewNumber) -> Self {
        let hash = Self::compute_hash(&cmds, view, parent_hash);
        Self {
            cmds,
            parent_hash,
            view,
            hash,
        }
    }

    pub fn hash(&self) -> BlockHash {
        self.hash
    }

    pub fn is_genesis(&self) -> bool {
        self.parent_hash.is_none() && self.view == ViewNumber::GENESIS
    }

    /// (P5) Recomputes the hash from the block's current fields and compares
    /// it against the cached value. Used to detect tampering after
    /// deserialization from an untrusted source.
    pub fn verify_hash(&self) -> bool {
        Self::compute_hash(&self.cmds, self.view, self.parent_hash) == self.hash
    }

    fn compute_hash(cmds: &[Command], view: ViewNumber, parent_hash: Option<BlockHash>) -> BlockHash {
        let mut buf = Vec::new();
        for cmd in cmds {
            buf.extend_from_slice(cmd.hash().as_bytes());
        }
        buf.extend_from_slice(&view.as_u64().to_be_bytes());
        match parent_hash {
            Some(h) => buf.extend_from_slice(h.as_bytes()),
            None => buf.extend_from_slice(b"genesis"),
        }
        BlockHash::digest(&buf)
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}
impl Eq for Block {}
