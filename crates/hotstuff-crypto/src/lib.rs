//! # hotstuff-crypto: placeholder partial-signature scheme
//!
//! **This is not a real threshold signature scheme.** §9's open question is
//! explicit that production implementations must substitute a real `(t,n)`
//! scheme (e.g. BLS) and port the domain separation below. What's here is a
//! hash-based placeholder that lets the replica core exercise the quorum
//! bookkeeping (accumulate `T` partial signatures, aggregate, verify) without
//! pulling in real key management, which is out of scope (§1).
//!
//! Domain separation: a partial signature is computed over the tuple
//! `(view, phase, block_hash)`, string-rendered and hashed, exactly as §4.1
//! specifies for `PREPARE_VOTE` (`partial_sig = H(v ∥ PREPARE_VOTE ∥
//! block.hash)`). Every vote kind reuses this one function with its own
//! phase tag so a `PRECOMMIT_VOTE` can never be replayed as a
//! `PREPARE_VOTE` for the same block.

use hotstuff_types::{BlockHash, Phase, ViewNumber, QC};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Computes the partial signature an honest replica attaches to a vote:
/// `H(view ∥ phase_tag ∥ block_hash)`.
///
/// This is *signing* only in the sense that it is a deterministic function
/// of the replica's own vote content — it carries no private key material,
/// so any party can compute the same value for the same inputs. That is
/// exactly the weakness §9 calls out.
pub fn partial_sign(view: ViewNumber, phase_tag: &str, block_hash: BlockHash) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(view.as_u64().to_be_bytes());
    hasher.update(phase_tag.as_bytes());
    hasher.update(block_hash.as_bytes());
    hasher.finalize().to_vec()
}

/// The vote tag `partial_sign` was called with when the votes making up a
/// QC of this phase were cast — `on_prepare`/`on_precommit`/`on_commit` in
/// `hotstuff-core::replica::phases` each sign with their own phase's tag.
fn vote_tag(phase: Phase) -> &'static str {
    match phase {
        Phase::Prepare => "PREPARE_VOTE",
        Phase::PreCommit => "PRECOMMIT_VOTE",
        Phase::Commit => "COMMIT_VOTE",
    }
}

/// Recomputes the expected partial signature for `qc`'s `(view, phase,
/// block)` and compares it against `qc.signature` — the "valid signature"
/// guard §4.1 requires before a `PRECOMMIT`/`COMMIT`/`DECIDE` handler may
/// act on an incoming QC, and the drop point §7 names for a "signature-
/// verification failure on an incoming QC". `QC::genesis` is trusted by
/// construction and always verifies.
pub fn verify_qc(qc: &QC) -> bool {
    if qc.view == ViewNumber::GENESIS && qc.block.is_genesis() {
        return true;
    }
    partial_sign(qc.view, vote_tag(qc.phase), qc.block_hash()) == qc.signature
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregateError {
    #[error("signature aggregator has not reached its threshold")]
    BelowThreshold,
}

/// Accumulates partial signatures for a single `(phase, view, block)` vote
/// round and reports whether a quorum has formed.
///
/// `verify()` is true iff some single signature value appears at least `T`
/// times in the multiset — a majority-of-equal-hashes placeholder for a
/// real threshold scheme (§3, §9). Because honest replicas all compute the
/// same `partial_sign` output for the same `(view, phase, block_hash)`,
/// `T` identical honest votes satisfy this trivially; the placeholder's
/// known weakness is that a *forger* who learns the expected value from
/// one honest vote can replay it as their own "signature" without holding
/// any key — a real `(t,n)` scheme would reject that.
#[derive(Debug, Clone)]
pub struct SignatureAggregator {
    threshold: usize,
    signatures: Vec<Vec<u8>>,
}

impl SignatureAggregator {
    /// `threshold` is `QUORUM = 2F+1`.
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            signatures: Vec::new(),
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Records a partial signature. Does not deduplicate by sender — callers
    /// (the replica's vote-bucket handlers) are responsible for admitting at
    /// most one signature per sender, per (I5) and §4.1's duplicate-vote
    /// handling note.
    pub fn add(&mut self, partial_sig: Vec<u8>) {
        self.signatures.push(partial_sig);
    }

    /// True iff some single value appears at least `threshold` times.
    pub fn verify(&self) -> bool {
        self.signatures
            .iter()
            .any(|candidate| self.count_matching(candidate) >= self.threshold)
    }

    /// Aggregates into a single opaque `Vec<u8>` carried in a formed [`QC`].
    ///
    /// The aggregate is just the majority value itself — there is no real
    /// combination step in this placeholder. Errors if no value has reached
    /// the threshold yet.
    ///
    /// [`QC`]: hotstuff_types::QC
    pub fn aggregate(&self) -> Result<Vec<u8>, AggregateError> {
        self.signatures
            .iter()
            .find(|candidate| self.count_matching(candidate) >= self.threshold)
            .cloned()
            .ok_or(AggregateError::BelowThreshold)
    }

    fn count_matching(&self, candidate: &[u8]) -> usize {
        self.signatures.iter().filter(|s| s.as_slice() == candidate).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotstuff_types::Block;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case(1, 1, true; "a single signature meets threshold 1")]
    #[test_case(2, 1, false; "one signature never meets threshold 2")]
    #[test_case(3, 3, true; "three signatures meet threshold 3")]
    #[test_case(3, 5, true; "more than threshold still verifies")]
    fn aggregator_threshold_table(threshold: usize, signatures: usize, expect_verified: bool) {
        let mut agg = SignatureAggregator::new(threshold);
        for _ in 0..signatures {
            agg.add(vec![42]);
        }
        assert_eq!(agg.verify(), expect_verified);
    }

    #[test]
    fn partial_sign_is_deterministic_and_domain_separated() {
        let block = Block::genesis();
        let a = partial_sign(ViewNumber::new(1), "PREPARE_VOTE", block.hash());
        let b = partial_sign(ViewNumber::new(1), "PREPARE_VOTE", block.hash());
        assert_eq!(a, b);

        let c = partial_sign(ViewNumber::new(1), "PRECOMMIT_VOTE", block.hash());
        assert_ne!(a, c, "distinct phase tags must not collide");

        let d = partial_sign(ViewNumber::new(2), "PREPARE_VOTE", block.hash());
        assert_ne!(a, d, "distinct views must not collide");
    }

    #[test]
    fn verify_qc_accepts_a_correctly_signed_qc() {
        let block = Block::genesis();
        let sig = partial_sign(ViewNumber::new(4), "PRECOMMIT_VOTE", block.hash());
        let qc = QC {
            phase: hotstuff_types::Phase::PreCommit,
            view: ViewNumber::new(4),
            block,
            signature: sig,
        };
        assert!(verify_qc(&qc));
    }

    #[test]
    fn verify_qc_rejects_a_forged_or_mismatched_signature() {
        let block = Block::genesis();
        let qc = QC {
            phase: hotstuff_types::Phase::Commit,
            view: ViewNumber::new(4),
            block,
            signature: vec![1, 2, 3],
        };
        assert!(!verify_qc(&qc));
    }

    #[test]
    fn verify_qc_trusts_genesis_unconditionally() {
        assert!(verify_qc(&QC::genesis()));
    }

    #[test]
    fn aggregator_requires_threshold_matching_signatures() {
        let mut agg = SignatureAggregator::new(3);
        let sig = vec![1, 2, 3];
        agg.add(sig.clone());
        agg.add(sig.clone());
        assert!(!agg.verify());
        assert_eq!(agg.aggregate(), Err(AggregateError::BelowThreshold));

        agg.add(sig.clone());
        assert!(agg.verify());
        assert_eq!(agg.aggregate(), Ok(sig));
    }

    #[test]
    fn aggregator_ignores_minority_values() {
        let mut agg = SignatureAggregator::new(3);
        agg.add(vec![1]);
        agg.add(vec![2]);
        agg.add(vec![3]);
        assert!(!agg.verify(), "three distinct values never reach threshold 3");
    }

    #[test]
    fn placeholder_accepts_replayed_value_as_a_forgery() {
        // Documents the known weakness from §9: a forger who merely knows
        // the expected value can "vote" with it, no private key needed.
        let block = Block::genesis();
        let expected = partial_sign(ViewNumber::new(5), "COMMIT_VOTE", block.hash());
        let mut agg = SignatureAggregator::new(2);
        agg.add(expected.clone());
        agg.add(expected); // forged, not independently produced
        assert!(agg.verify());
    }

    proptest! {
        /// `verify()` tracks `count_matching` exactly: for any mix of a
        /// majority value and distinct minority noise, the aggregator
        /// verifies iff the majority value alone reaches the threshold.
        #[test]
        fn prop_verify_exactly_tracks_majority_count(
            threshold in 2usize..8,
            majority_extra in 0usize..8,
            noise in prop::collection::hash_set(1u8..250, 0..6),
        ) {
            let majority = vec![0u8];
            let majority_count = threshold.saturating_sub(1) + majority_extra;
            let mut agg = SignatureAggregator::new(threshold);
            for _ in 0..majority_count {
                agg.add(majority.clone());
            }
            // Each noise value is distinct and appears exactly once, so with
            // `threshold >= 2` no single noise entry can reach quorum on its
            // own — only the majority value can.
            for n in &noise {
                agg.add(vec![*n]);
            }
            prop_assert_eq!(agg.verify(), majority_count >= threshold);
        }

        /// Views and phase tags are both part of the domain separation:
        /// changing either alone must change the partial signature.
        #[test]
        fn prop_partial_sign_is_domain_separated(view_a in 0u64..1000, view_b in 0u64..1000) {
            prop_assume!(view_a != view_b);
            let block = Block::genesis();
            let a = partial_sign(ViewNumber::new(view_a), "PREPARE_VOTE", block.hash());
            let b = partial_sign(ViewNumber::new(view_b), "PREPARE_VOTE", block.hash());
            prop_assert_ne!(a, b);
        }
    }
}
