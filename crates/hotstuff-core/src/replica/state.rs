//! [`ReplicaState`]: the per-replica data §3 describes, plus the bookkeeping
//! (vote buckets, replay-detection tracker) its handlers need.

use std::collections::{HashMap, HashSet, VecDeque};

use hotstuff_types::{Block, BlockHash, Command, ProtocolMessage, QC, ReplicaId, ViewNumber};

use crate::config::ClusterConfig;

/// Identifies one protocol message for replay detection (§8, scenario 6):
/// `(sender, kind, view)`. Re-delivery of a stale message with an
/// already-seen id is dropped before it reaches a phase handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId {
    pub sender: ReplicaId,
    pub kind: u8,
    pub view: ViewNumber,
}

impl MessageId {
    pub fn of(msg: &ProtocolMessage) -> Self {
        Self {
            sender: msg.sender,
            kind: msg.kind.discriminant(),
            view: msg.view,
        }
    }
}

/// Tracks every `MessageId` a replica has admitted, so a replayed message
/// is recognized and dropped (I5, §8 scenario 6).
#[derive(Debug, Default)]
pub struct MessageDedupTracker {
    seen: HashSet<MessageId>,
}

impl MessageDedupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `id`; returns `true` the first time it's seen, `false` on
    /// replay.
    pub fn record(&mut self, id: MessageId) -> bool {
        self.seen.insert(id)
    }
}

/// Accumulates votes for one `(phase, view)` round. Tracks which senders
/// have already voted (I5: at most one vote per sender per round) and
/// which block the bucket is for, so a vote for any other block is
/// rejected outright — the defense §4.1 calls out against a malicious
/// voter splitting a quorum.
#[derive(Debug)]
pub struct VoteBucket {
    block_hash: BlockHash,
    signers: HashSet<ReplicaId>,
    aggregator: hotstuff_crypto::SignatureAggregator,
}

impl VoteBucket {
    pub fn new(block_hash: BlockHash, threshold: usize) -> Self {
        Self {
            block_hash,
            signers: HashSet::new(),
            aggregator: hotstuff_crypto::SignatureAggregator::new(threshold),
        }
    }

    /// Admits `sender`'s vote if it's for this bucket's block and `sender`
    /// hasn't voted here yet. Returns `true` exactly once — on the call
    /// that pushes the bucket over quorum — so the caller can form and
    /// broadcast the resulting QC exactly once per round.
    pub fn admit(&mut self, sender: ReplicaId, voted_block: BlockHash, partial_sig: Vec<u8>) -> bool {
        if voted_block != self.block_hash || self.signers.contains(&sender) {
            return false;
        }
        let was_satisfied = self.aggregator.verify();
        self.signers.insert(sender);
        self.aggregator.add(partial_sig);
        !was_satisfied && self.aggregator.verify()
    }

    pub fn aggregate(&self) -> Result<Vec<u8>, hotstuff_crypto::AggregateError> {
        self.aggregator.aggregate()
    }

    pub fn len(&self) -> usize {
        self.signers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signers.is_empty()
    }
}

/// The state one replica carries between events (§3).
#[derive(Debug)]
pub struct ReplicaState {
    pub replica_id: ReplicaId,
    pub cluster: ClusterConfig,
    pub current_view: ViewNumber,
    /// Committed blocks, in order, starting at genesis.
    pub log: Vec<Block>,
    /// Every block this replica has seen proposed, keyed by hash, so
    /// `extends` can walk parent chains that aren't committed yet.
    pub chain: HashMap<BlockHash, Block>,
    pub high_prepare_qc: QC,
    pub locked_qc: QC,
    pub current_proposal: Option<Block>,
    pub new_view_msgs: HashMap<ViewNumber, Vec<ProtocolMessage>>,
    pub prepare_votes: HashMap<ViewNumber, VoteBucket>,
    pub precommit_votes: HashMap<ViewNumber, VoteBucket>,
    pub commit_votes: HashMap<ViewNumber, VoteBucket>,
    pub pending_cmds: VecDeque<Command>,
    pub dedup: MessageDedupTracker,
}

impl ReplicaState {
    pub fn new(replica_id: ReplicaId, cluster: ClusterConfig) -> Self {
        let genesis = Block::genesis();
        let mut chain = HashMap::new();
        chain.insert(genesis.hash(), genesis.clone());
        Self {
            replica_id,
            cluster,
            current_view: ViewNumber::GENESIS,
            log: vec![genesis],
            chain,
            high_prepare_qc: QC::genesis(),
            locked_qc: QC::genesis(),
            current_proposal: None,
            new_view_msgs: HashMap::new(),
            prepare_votes: HashMap::new(),
            precommit_votes: HashMap::new(),
            commit_votes: HashMap::new(),
            pending_cmds: VecDeque::new(),
            dedup: MessageDedupTracker::new(),
        }
    }

    pub fn is_leader(&self, view: ViewNumber) -> bool {
        view.leader(self.cluster.n as u64) == self.replica_id
    }

    pub fn leader_of(&self, view: ViewNumber) -> ReplicaId {
        view.leader(self.cluster.n as u64)
    }

    pub fn enqueue_command(&mut self, cmd: Command) {
        self.pending_cmds.push_back(cmd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_replica_starts_at_genesis() {
        let state = ReplicaState::new(ReplicaId::new(0), ClusterConfig::new(4, 1).unwrap());
        assert_eq!(state.current_view, ViewNumber::GENESIS);
        assert_eq!(state.log.len(), 1);
        assert!(state.log[0].is_genesis());
    }

    #[test]
    fn is_leader_follows_round_robin() {
        let state = ReplicaState::new(ReplicaId::new(1), ClusterConfig::new(4, 1).unwrap());
        assert!(state.is_leader(ViewNumber::new(1)));
        assert!(!state.is_leader(ViewNumber::new(2)));
    }

    #[test]
    fn vote_bucket_rejects_duplicate_senders() {
        let mut bucket = VoteBucket::new(BlockHash::GENESIS, 2);
        assert!(!bucket.admit(ReplicaId::new(0), BlockHash::GENESIS, vec![1]));
        assert!(!bucket.admit(ReplicaId::new(0), BlockHash::GENESIS, vec![1]), "same sender twice must not count twice");
        assert_eq!(bucket.len(), 1);
    }

    #[test]
    fn vote_bucket_rejects_votes_for_a_different_block() {
        let mut bucket = VoteBucket::new(BlockHash::GENESIS, 1);
        assert!(!bucket.admit(ReplicaId::new(0), BlockHash::digest(b"other"), vec![1]));
        assert!(bucket.is_empty());
    }

    #[test]
    fn vote_bucket_signals_quorum_exactly_once() {
        let mut bucket = VoteBucket::new(BlockHash::GENESIS, 2);
        assert!(!bucket.admit(ReplicaId::new(0), BlockHash::GENESIS, vec![9]));
        assert!(bucket.admit(ReplicaId::new(1), BlockHash::GENESIS, vec![9]));
        assert!(!bucket.admit(ReplicaId::new(2), BlockHash::GENESIS, vec![9]), "must not fire again past quorum");
    }

    #[test]
    fn dedup_tracker_flags_replays() {
        let mut tracker = MessageDedupTracker::new();
        let id = MessageId {
            sender: ReplicaId::new(0),
            kind: 1,
            view: ViewNumber::new(1),
        };
        assert!(tracker.record(id));
        assert!(!tracker.record(id), "replaying the same message id must be detected");
    }
}
