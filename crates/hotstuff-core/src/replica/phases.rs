//! Phase handlers (§4.1): the eight message handlers plus the pacemaker
//! entry point, each consuming `self` and returning `(Self, ReplicaOutput)`.
//!
//! Guard predicates follow §4.1 literally: `matching_msg` is
//! `ProtocolMessage::matches` plus a `view == current_view` check;
//! `matching_qc` is `QC::matches`. Anything that fails a guard, a replay
//! check, or a safety check is dropped silently (§7) — handlers never
//! return a `Result`; there is no caller-visible failure inside the core.

use std::collections::HashMap;

use hotstuff_types::{Block, BlockHash, Command, MessageKind, Phase, ProtocolMessage, QC, ReplicaId, ViewNumber};

use crate::instrumentation::METRICS;
use crate::replica::safety;
use crate::replica::state::{MessageId, ReplicaState, VoteBucket};
use crate::replica::ReplicaOutput;
use crate::transport::CommandResult;

/// Admits one vote into `bucket_map[current_view]` and, the moment the
/// bucket crosses quorum, aggregates it into a QC for `phase`. Shared by
/// all three vote handlers — they differ only in which bucket map they
/// use and what QC phase / next broadcast they produce.
fn admit_vote(
    current_view: ViewNumber,
    quorum: usize,
    proposal: &Block,
    bucket_map: &mut HashMap<ViewNumber, VoteBucket>,
    sender: ReplicaId,
    voted_block: BlockHash,
    partial_sig: Vec<u8>,
    phase: Phase,
) -> Option<QC> {
    let bucket = bucket_map
        .entry(current_view)
        .or_insert_with(|| VoteBucket::new(proposal.hash(), quorum));
    METRICS.increment_votes_recorded();
    if !bucket.admit(sender, voted_block, partial_sig) {
        return None;
    }
    let signature = bucket.aggregate().ok()?;
    METRICS.increment_quorums_formed();
    Some(QC {
        phase,
        view: current_view,
        block: proposal.clone(),
        signature,
    })
}

impl ReplicaState {
    /// Pacemaker-driven or startup-driven entry into a view (§4.1,
    /// `start_new_view`). Monotone per (I4): a call for a view no greater
    /// than the current one is a no-op.
    pub fn start_new_view(mut self, view: ViewNumber) -> (Self, ReplicaOutput) {
        let mut output = ReplicaOutput::none();
        if view <= self.current_view {
            return (self, output);
        }
        self.current_view = view;
        self.current_proposal = None;
        let leader = self.leader_of(view);
        let msg = ProtocolMessage::new_view(view, self.replica_id, self.high_prepare_qc.clone());
        if leader == self.replica_id {
            // self-delivery shortcut (§4.3): the leader is also a voter.
            let (next, mut leader_output) = self.on_new_view(msg);
            self = next;
            output.messages.append(&mut leader_output.messages);
        } else {
            output.unicast(leader, msg);
        }
        METRICS.increment_view_changes();
        (self, output)
    }

    /// The pacemaker's view-timeout signal: advance to `current_view + 1`.
    pub fn on_view_timeout(self) -> (Self, ReplicaOutput) {
        let next_view = self.current_view.next();
        self.start_new_view(next_view)
    }

    /// A `Command` arriving from a client. Enqueued for the next proposal;
    /// if this replica is already leader and waiting only on pending work
    /// (§4.1 step 2's "wait" decision — see DESIGN.md), proposing happens
    /// immediately.
    pub fn on_client_command(mut self, cmd: Command) -> (Self, ReplicaOutput) {
        self.enqueue_command(cmd);
        let mut output = ReplicaOutput::none();
        self.try_propose(&mut output);
        (self, output)
    }

    /// `NEW_VIEW` (replica → leader). Accumulates `new_view_msgs[v]`;
    /// proposes once `QUORUM` is reached and commands are available.
    pub fn on_new_view(mut self, msg: ProtocolMessage) -> (Self, ReplicaOutput) {
        let mut output = ReplicaOutput::none();
        if !self.is_leader(self.current_view) || msg.view != self.current_view {
            return (self, output);
        }
        if !self.dedup.record(MessageId::of(&msg)) {
            METRICS.increment_replay_attempts();
            return (self, output);
        }
        self.new_view_msgs.entry(msg.view).or_default().push(msg);
        self.try_propose(&mut output);
        (self, output)
    }

    /// Shared by [`ReplicaState::on_new_view`] and
    /// [`ReplicaState::on_client_command`]: proposes exactly when this
    /// replica leads the current view, has `QUORUM` `NEW_VIEW`s, has not
    /// already proposed, and has a command to include.
    fn try_propose(&mut self, output: &mut ReplicaOutput) {
        if !self.is_leader(self.current_view) || self.current_proposal.is_some() {
            return;
        }
        let count = self.new_view_msgs.get(&self.current_view).map_or(0, Vec::len);
        if count < self.cluster.quorum() {
            return;
        }
        let Some(cmd) = self.pending_cmds.pop_front() else {
            return; // no command to propose: wait (§4.1 step 2, DESIGN.md)
        };
        let highest_qc = self
            .new_view_msgs
            .get(&self.current_view)
            .into_iter()
            .flatten()
            .filter_map(|m| m.justify.as_ref())
            .max_by_key(|qc| qc.view)
            .cloned()
            .unwrap_or_else(QC::genesis);

        let block = Block::new(vec![cmd], Some(highest_qc.block_hash()), self.current_view);
        self.chain.insert(block.hash(), block.clone());
        self.current_proposal = Some(block.clone());
        output.broadcast(ProtocolMessage::prepare(self.current_view, self.replica_id, block, highest_qc));
    }

    /// `PREPARE` (replica). Votes iff the proposal both extends and is
    /// safe relative to this replica's lock (§4.1).
    pub fn on_prepare(mut self, msg: ProtocolMessage) -> (Self, ReplicaOutput) {
        let mut output = ReplicaOutput::none();
        if !msg.matches(MessageKind::Prepare, self.current_view) {
            return (self, output);
        }
        if !self.dedup.record(MessageId::of(&msg)) {
            METRICS.increment_replay_attempts();
            return (self, output);
        }
        let (Some(block), Some(justify)) = (msg.block, msg.justify) else {
            return (self, output);
        };
        self.chain.entry(justify.block_hash()).or_insert_with(|| justify.block.clone());

        if !safety::extends(&block, justify.block_hash(), &self.chain) {
            METRICS.increment_dropped_unsafe();
            return (self, output);
        }
        if !safety::safe_block(&block, &justify, &self.locked_qc, &self.chain) {
            METRICS.increment_dropped_unsafe();
            return (self, output);
        }

        self.chain.insert(block.hash(), block.clone());
        self.current_proposal = Some(block.clone());
        let partial_sig = hotstuff_crypto::partial_sign(self.current_view, MessageKind::PrepareVote.as_str(), block.hash());
        let leader = self.leader_of(self.current_view);
        let vote = ProtocolMessage::vote(MessageKind::PrepareVote, self.current_view, self.replica_id, block, partial_sig);
        output.unicast(leader, vote);
        (self, output)
    }

    /// `PREPARE_VOTE` (leader). On reaching `QUORUM`, forms the PREPARE
    /// QC, updates `high_prepare_qc`, and broadcasts `PRECOMMIT`.
    pub fn on_prepare_vote(mut self, msg: ProtocolMessage) -> (Self, ReplicaOutput) {
        let mut output = ReplicaOutput::none();
        if !self.is_leader(self.current_view) || !msg.matches(MessageKind::PrepareVote, self.current_view) {
            return (self, output);
        }
        let Some(proposal) = self.current_proposal.clone() else {
            return (self, output);
        };
        let (Some(block), Some(sig)) = (msg.block, msg.partial_sig) else {
            return (self, output);
        };
        if block.hash() != proposal.hash() {
            // malicious voter targeting a block the leader never proposed (§4.1)
            return (self, output);
        }
        let quorum = self.cluster.quorum();
        let view = self.current_view;
        if let Some(qc) = admit_vote(view, quorum, &proposal, &mut self.prepare_votes, msg.sender, block.hash(), sig, Phase::Prepare) {
            self.high_prepare_qc = qc.clone();
            output.broadcast(ProtocolMessage::phase_justify(MessageKind::PreCommit, view, self.replica_id, qc));
        }
        (self, output)
    }

    /// `PRECOMMIT` (replica). Adopts `justify` as `high_prepare_qc` if
    /// it's newer, then votes.
    pub fn on_precommit(mut self, msg: ProtocolMessage) -> (Self, ReplicaOutput) {
        let mut output = ReplicaOutput::none();
        if !msg.matches(MessageKind::PreCommit, self.current_view) {
            return (self, output);
        }
        if !self.dedup.record(MessageId::of(&msg)) {
            METRICS.increment_replay_attempts();
            return (self, output);
        }
        let Some(justify) = msg.justify else {
            return (self, output);
        };
        if !justify.matches(Phase::Prepare, self.current_view) {
            return (self, output);
        }
        if !hotstuff_crypto::verify_qc(&justify) {
            METRICS.increment_dropped_unsafe();
            return (self, output);
        }
        self.chain.entry(justify.block_hash()).or_insert_with(|| justify.block.clone());
        if justify.view > self.high_prepare_qc.view {
            self.high_prepare_qc = justify.clone();
        }
        let block = justify.block;
        let partial_sig = hotstuff_crypto::partial_sign(self.current_view, MessageKind::PreCommitVote.as_str(), block.hash());
        let leader = self.leader_of(self.current_view);
        output.unicast(
            leader,
            ProtocolMessage::vote(MessageKind::PreCommitVote, self.current_view, self.replica_id, block, partial_sig),
        );
        (self, output)
    }

    /// `PRECOMMIT_VOTE` (leader). On reaching `QUORUM`, forms the
    /// PRECOMMIT QC and broadcasts `COMMIT`.
    pub fn on_precommit_vote(mut self, msg: ProtocolMessage) -> (Self, ReplicaOutput) {
        let mut output = ReplicaOutput::none();
        if !self.is_leader(self.current_view) || !msg.matches(MessageKind::PreCommitVote, self.current_view) {
            return (self, output);
        }
        let Some(proposal) = self.current_proposal.clone() else {
            return (self, output);
        };
        let (Some(block), Some(sig)) = (msg.block, msg.partial_sig) else {
            return (self, output);
        };
        if block.hash() != proposal.hash() {
            return (self, output);
        }
        let quorum = self.cluster.quorum();
        let view = self.current_view;
        if let Some(qc) = admit_vote(view, quorum, &proposal, &mut self.precommit_votes, msg.sender, block.hash(), sig, Phase::PreCommit) {
            output.broadcast(ProtocolMessage::phase_justify(MessageKind::Commit, view, self.replica_id, qc));
        }
        (self, output)
    }

    /// `COMMIT` (replica). Adopts `justify` as `locked_qc` if it's newer —
    /// the safety pivot (the LOCK step) — then votes.
    pub fn on_commit(mut self, msg: ProtocolMessage) -> (Self, ReplicaOutput) {
        let mut output = ReplicaOutput::none();
        if !msg.matches(MessageKind::Commit, self.current_view) {
            return (self, output);
        }
        if !self.dedup.record(MessageId::of(&msg)) {
            METRICS.increment_replay_attempts();
            return (self, output);
        }
        let Some(justify) = msg.justify else {
            return (self, output);
        };
        if !justify.matches(Phase::PreCommit, self.current_view) {
            return (self, output);
        }
        if !hotstuff_crypto::verify_qc(&justify) {
            METRICS.increment_dropped_unsafe();
            return (self, output);
        }
        self.chain.entry(justify.block_hash()).or_insert_with(|| justify.block.clone());
        if justify.view > self.locked_qc.view {
            self.locked_qc = justify.clone();
        }
        let block = justify.block;
        let partial_sig = hotstuff_crypto::partial_sign(self.current_view, MessageKind::CommitVote.as_str(), block.hash());
        let leader = self.leader_of(self.current_view);
        output.unicast(
            leader,
            ProtocolMessage::vote(MessageKind::CommitVote, self.current_view, self.replica_id, block, partial_sig),
        );
        (self, output)
    }

    /// `COMMIT_VOTE` (leader). On reaching `QUORUM`, forms the COMMIT QC
    /// and broadcasts `DECIDE`.
    pub fn on_commit_vote(mut self, msg: ProtocolMessage) -> (Self, ReplicaOutput) {
        let mut output = ReplicaOutput::none();
        if !self.is_leader(self.current_view) || !msg.matches(MessageKind::CommitVote, self.current_view) {
            return (self, output);
        }
        let Some(proposal) = self.current_proposal.clone() else {
            return (self, output);
        };
        let (Some(block), Some(sig)) = (msg.block, msg.partial_sig) else {
            return (self, output);
        };
        if block.hash() != proposal.hash() {
            return (self, output);
        }
        let quorum = self.cluster.quorum();
        let view = self.current_view;
        if let Some(qc) = admit_vote(view, quorum, &proposal, &mut self.commit_votes, msg.sender, block.hash(), sig, Phase::Commit) {
            output.broadcast(ProtocolMessage::phase_justify(MessageKind::Decide, view, self.replica_id, qc));
        }
        (self, output)
    }

    /// `DECIDE` (replica). Appends the decided block to the log exactly
    /// once, replies to its commands' clients, and advances to the next
    /// view (§4.1's final handler step).
    pub fn on_decide(mut self, msg: ProtocolMessage) -> (Self, ReplicaOutput) {
        let mut output = ReplicaOutput::none();
        if !msg.matches(MessageKind::Decide, self.current_view) {
            return (self, output);
        }
        if !self.dedup.record(MessageId::of(&msg)) {
            METRICS.increment_replay_attempts();
            return (self, output);
        }
        let Some(justify) = msg.justify else {
            return (self, output);
        };
        if !justify.matches(Phase::Commit, self.current_view) {
            return (self, output);
        }
        if !hotstuff_crypto::verify_qc(&justify) {
            METRICS.increment_dropped_unsafe();
            return (self, output);
        }
        let block = justify.block;
        if !self.log.iter().any(|b| b.hash() == block.hash()) {
            for cmd in &block.cmds {
                output.client_reply(CommandResult {
                    client_id: cmd.client_id,
                    request_id: cmd.request_id,
                    block_hash: block.hash(),
                    view: self.current_view,
                });
            }
            self.log.push(block);
            METRICS.increment_blocks_committed();
        }
        let next_view = self.current_view.next();
        let (next_self, mut next_output) = self.start_new_view(next_view);
        output.messages.append(&mut next_output.messages);
        (next_self, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClusterConfig;
    use hotstuff_types::ClientId;

    fn cluster() -> ClusterConfig {
        ClusterConfig::new(4, 1).unwrap()
    }

    fn cmd(n: u64) -> Command {
        Command::new("SET", vec!["A".into(), n.to_string()], ClientId::new(1), n)
    }

    /// Drives a quorum of `NEW_VIEW`s into the leader for `view`, confirming
    /// it proposes once a command is available.
    #[test]
    fn leader_proposes_once_quorum_of_new_views_and_a_command_arrive() {
        let leader_id = ViewNumber::new(1).leader(4);
        let mut state = ReplicaState::new(leader_id, cluster());
        state.current_view = ViewNumber::new(1);

        for sender in 0..3u64 {
            let msg = ProtocolMessage::new_view(ViewNumber::new(1), ReplicaId::new(sender), QC::genesis());
            let (next, output) = state.on_new_view(msg);
            state = next;
            if sender < 2 {
                assert!(output.is_empty(), "must wait for quorum before proposing");
            }
        }
        assert!(state.current_proposal.is_none(), "no command queued yet: must wait, not propose empty");

        let (next, output) = state.on_client_command(cmd(1));
        state = next;
        assert!(state.current_proposal.is_some());
        assert_eq!(output.messages.len(), 1);
    }

    #[test]
    fn replica_votes_prepare_for_a_safe_extending_proposal() {
        let follower = ReplicaId::new((ViewNumber::new(1).leader(4).as_u64() + 1) % 4);
        let mut state = ReplicaState::new(follower, cluster());
        state.current_view = ViewNumber::new(1);

        let block = Block::new(vec![cmd(1)], Some(Block::genesis().hash()), ViewNumber::new(1));
        let msg = ProtocolMessage::prepare(ViewNumber::new(1), ViewNumber::new(1).leader(4), block, QC::genesis());
        let (next, output) = state.on_prepare(msg);
        assert_eq!(output.messages.len(), 1);
        assert!(next.current_proposal.is_some());
    }

    #[test]
    fn stale_message_is_dropped_as_a_replay() {
        let mut state = ReplicaState::new(ReplicaId::new(0), cluster());
        state.current_view = ViewNumber::new(5);
        let stale = ProtocolMessage::prepare(ViewNumber::new(1), ReplicaId::new(1), Block::genesis(), QC::genesis());
        let (_next, output) = state.on_prepare(stale);
        assert!(output.is_empty(), "a message for a past view must never be matched, let alone voted on");
    }

    #[test]
    fn duplicate_delivery_of_the_same_message_is_a_replay() {
        let mut state = ReplicaState::new(ReplicaId::new(0), cluster());
        state.current_view = ViewNumber::new(1);
        let leader = ViewNumber::new(1).leader(4);
        let block = Block::new(vec![cmd(1)], Some(Block::genesis().hash()), ViewNumber::new(1));
        let msg = ProtocolMessage::prepare(ViewNumber::new(1), leader, block, QC::genesis());

        let (next, first) = state.on_prepare(msg.clone());
        let (_next2, second) = next.on_prepare(msg);
        assert!(!first.is_empty());
        assert!(second.is_empty(), "re-delivering the same PREPARE must be dropped");
    }

    #[test]
    fn precommit_with_a_forged_justify_signature_is_dropped() {
        let mut state = ReplicaState::new(ReplicaId::new(0), cluster());
        state.current_view = ViewNumber::new(1);
        let block = Block::new(vec![cmd(1)], Some(Block::genesis().hash()), ViewNumber::new(1));
        let forged = QC {
            phase: Phase::Prepare,
            view: ViewNumber::new(1),
            block,
            signature: vec![0xde, 0xad],
        };
        let msg = ProtocolMessage::phase_justify(MessageKind::PreCommit, ViewNumber::new(1), ReplicaId::new(1), forged);
        let (next, output) = state.on_precommit(msg);
        assert!(output.is_empty(), "a QC with a signature that doesn't verify must never be adopted");
        assert_eq!(next.high_prepare_qc.view, ViewNumber::GENESIS, "high_prepare_qc must not move");
    }

    #[test]
    fn commit_with_a_forged_justify_signature_is_dropped() {
        let mut state = ReplicaState::new(ReplicaId::new(0), cluster());
        state.current_view = ViewNumber::new(1);
        let block = Block::new(vec![cmd(1)], Some(Block::genesis().hash()), ViewNumber::new(1));
        let forged = QC {
            phase: Phase::PreCommit,
            view: ViewNumber::new(1),
            block,
            signature: vec![0xde, 0xad],
        };
        let msg = ProtocolMessage::phase_justify(MessageKind::Commit, ViewNumber::new(1), ReplicaId::new(1), forged);
        let (next, output) = state.on_commit(msg);
        assert!(output.is_empty(), "a QC with a signature that doesn't verify must never become the lock");
        assert_eq!(next.locked_qc.view, ViewNumber::GENESIS, "locked_qc must not move");
    }

    #[test]
    fn decide_with_a_forged_justify_signature_is_dropped() {
        let mut state = ReplicaState::new(ReplicaId::new(0), cluster());
        state.current_view = ViewNumber::new(1);
        let block = Block::new(vec![cmd(1)], Some(Block::genesis().hash()), ViewNumber::new(1));
        let forged = QC {
            phase: Phase::Commit,
            view: ViewNumber::new(1),
            block,
            signature: vec![0xde, 0xad],
        };
        let msg = ProtocolMessage::phase_justify(MessageKind::Decide, ViewNumber::new(1), ReplicaId::new(1), forged);
        let (next, output) = state.on_decide(msg);
        assert!(output.is_empty(), "an unverifiable QC must never be committed");
        assert!(next.log.is_empty(), "the log must stay empty without a verified DECIDE");
    }
}
