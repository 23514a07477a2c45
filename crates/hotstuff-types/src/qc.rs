//! [`QC`]: a quorum certificate — proof that `2F+1` replicas voted for a
//! `(phase, view, block)` triple.

use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::hash::BlockHash;
use crate::ids::ViewNumber;

/// The three voting phases a QC can certify. `NEW_VIEW` and `DECIDE` never
/// produce their own QC kind here: `NEW_VIEW` carries the sender's
/// `high_prepare_qc`, and `DECIDE` is justified by a `Commit` QC (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Prepare,
    PreCommit,
    Commit,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Prepare => "PREPARE",
            Phase::PreCommit => "PRECOMMIT",
            Phase::Commit => "COMMIT",
        }
    }
}

/// A quorum certificate: `2F+1` partial signatures over `(view, phase,
/// block.hash)`, aggregated by the leader once a bucket reaches `QUORUM`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QC {
    pub phase: Phase,
    pub view: ViewNumber,
    pub block: Block,
    /// Aggregate signature proving `2F+1` replicas signed
    /// `(view, phase, block.hash)`. See `hotstuff-crypto::AggregateSignature`.
    pub signature: Vec<u8>,
}

impl QC {
    /// The genesis QC: `phase=PREPARE, view=0, block=genesis,
    /// signature=valid-by-construction` (§3). Every honest replica starts
    /// with this as both its `high_prepare_qc` and (vacuously) its
    /// `locked_qc` precursor.
    pub fn genesis() -> Self {
        Self {
            phase: Phase::Prepare,
            view: ViewNumber::GENESIS,
            block: Block::genesis(),
            signature: Vec::new(),
        }
    }

    pub fn block_hash(&self) -> BlockHash {
        self.block.hash()
    }

    /// `matching_qc(qc, phase, view)` guard from §4.1.
    pub fn matches(&self, phase: Phase, view: ViewNumber) -> bool {
        self.phase == phase && self.view == view
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_qc_matches_prepare_view_zero() {
        let qc = QC::genesis();
        assert!(qc.matches(Phase::Prepare, ViewNumber::GENESIS));
        assert!(!qc.matches(Phase::PreCommit, ViewNumber::GENESIS));
    }
}
