//! [`ProtocolMessage`]: the wire message exchanged between replicas, and the
//! `Payload` envelope a [`crate::Command`] or `ProtocolMessage` travels in.

use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::command::Command;
use crate::ids::{ReplicaId, ViewNumber};
use crate::qc::QC;

/// The eight message phases of the protocol (§3). `NEW_VIEW` opens a view;
/// `PREPARE`/`PRECOMMIT`/`COMMIT`/`DECIDE` are leader broadcasts; the
/// `_VOTE` variants are the matching replica responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    NewView,
    Prepare,
    PrepareVote,
    PreCommit,
    PreCommitVote,
    Commit,
    CommitVote,
    Decide,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::NewView => "NEW_VIEW",
            MessageKind::Prepare => "PREPARE",
            MessageKind::PrepareVote => "PREPARE_VOTE",
            MessageKind::PreCommit => "PRECOMMIT",
            MessageKind::PreCommitVote => "PRECOMMIT_VOTE",
            MessageKind::Commit => "COMMIT",
            MessageKind::CommitVote => "COMMIT_VOTE",
            MessageKind::Decide => "DECIDE",
        }
    }

    /// A short numeric discriminant, used by the replay-detection dedup
    /// tracker so it can key on `(sender, kind, view)` without storing the
    /// much larger `MessageKind` itself.
    pub fn discriminant(self) -> u8 {
        match self {
            MessageKind::NewView => 0,
            MessageKind::Prepare => 1,
            MessageKind::PrepareVote => 2,
            MessageKind::PreCommit => 3,
            MessageKind::PreCommitVote => 4,
            MessageKind::Commit => 5,
            MessageKind::CommitVote => 6,
            MessageKind::Decide => 7,
        }
    }
}

/// A protocol message: `{ phase, view, block (nullable), justify: QC
/// (nullable), partial_sig (nullable), sender }` (§3).
///
/// Vote messages (`*_VOTE`) carry `partial_sig` and `block` but no
/// `justify`; leader phase messages after `PREPARE` carry `justify` and
/// omit a fresh `block` (the block already traveled in the `PREPARE`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolMessage {
    pub kind: MessageKind,
    pub view: ViewNumber,
    pub block: Option<Block>,
    pub justify: Option<QC>,
    pub partial_sig: Option<Vec<u8>>,
    pub sender: ReplicaId,
}

impl ProtocolMessage {
    pub fn new_view(view: ViewNumber, sender: ReplicaId, high_prepare_qc: QC) -> Self {
        Self {
            kind: MessageKind::NewView,
            view,
            block: None,
            justify: Some(high_prepare_qc),
            partial_sig: None,
            sender,
        }
    }

    pub fn prepare(view: ViewNumber, sender: ReplicaId, block: Block, justify: QC) -> Self {
        Self {
            kind: MessageKind::Prepare,
            view,
            block: Some(block),
            justify: Some(justify),
            partial_sig: None,
            sender,
        }
    }

    pub fn vote(kind: MessageKind, view: ViewNumber, sender: ReplicaId, block: Block, partial_sig: Vec<u8>) -> Self {
        debug_assert!(matches!(
            kind,
            MessageKind::PrepareVote | MessageKind::PreCommitVote | MessageKind::CommitVote
        ));
        Self {
            kind,
            view,
            block: Some(block),
            justify: None,
            partial_sig: Some(partial_sig),
            sender,
        }
    }

    pub fn phase_justify(kind: MessageKind, view: ViewNumber, sender: ReplicaId, justify: QC) -> Self {
        debug_assert!(matches!(
            kind,
            MessageKind::PreCommit | MessageKind::Commit | MessageKind::Decide
        ));
        Self {
            kind,
            view,
            block: None,
            justify: Some(justify),
            partial_sig: None,
            sender,
        }
    }

    /// `matching_msg(m, phase, view)` from §4.1, minus the caller's own
    /// `current_view` comparison (the replica knows its own view; this
    /// only checks the message's internal consistency).
    pub fn matches(&self, kind: MessageKind, view: ViewNumber) -> bool {
        self.kind == kind && self.view == view
    }
}

/// Wire envelope: a `Command` from a client, or a `ProtocolMessage` between
/// replicas, tagged so a single framed stream can carry either (§6.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Payload {
    Command(Command),
    Protocol(ProtocolMessage),
}

impl From<Command> for Payload {
    fn from(cmd: Command) -> Self {
        Payload::Command(cmd)
    }
}

impl From<ProtocolMessage> for Payload {
    fn from(msg: ProtocolMessage) -> Self {
        Payload::Protocol(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::BlockHash;

    #[test]
    fn matches_checks_kind_and_view() {
        let msg = ProtocolMessage::new_view(ViewNumber::new(3), ReplicaId::new(0), QC::genesis());
        assert!(msg.matches(MessageKind::NewView, ViewNumber::new(3)));
        assert!(!msg.matches(MessageKind::NewView, ViewNumber::new(4)));
        assert!(!msg.matches(MessageKind::Prepare, ViewNumber::new(3)));
    }

    #[test]
    fn prepare_carries_block_and_justify_no_sig() {
        let block = Block::new(vec![], Some(BlockHash::GENESIS), ViewNumber::new(1));
        let msg = ProtocolMessage::prepare(ViewNumber::new(1), ReplicaId::new(0), block, QC::genesis());
        assert!(msg.block.is_some());
        assert!(msg.justify.is_some());
        assert!(msg.partial_sig.is_none());
    }

    #[test]
    fn vote_carries_sig_and_block_no_justify() {
        let block = Block::new(vec![], Some(BlockHash::GENESIS), ViewNumber::new(1));
        let msg = ProtocolMessage::vote(
            MessageKind::PrepareVote,
            ViewNumber::new(1),
            ReplicaId::new(1),
            block,
            vec![1, 2, 3],
        );
        assert!(msg.partial_sig.is_some());
        assert!(msg.justify.is_none());
    }
}
