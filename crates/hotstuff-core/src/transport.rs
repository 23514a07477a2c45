//! The transport port (§4.3): what the replica core assumes of its message
//! plane, without naming a socket.
//!
//! Shaped after `kimberlite-sim::adapters::network::Network` / `SimNetwork`:
//! one trait, one in-memory implementation driven entirely by channels for
//! the deterministic test harness and the fault-injection overlays, and a
//! production implementation (`hotstuff-net::TcpTransport`) living in its
//! own crate since the pure core must never name `tokio` (§5.1).

use std::collections::HashMap;
use std::sync::mpsc::{Receiver, SendError, Sender};
use std::sync::{Arc, Mutex};

use hotstuff_types::{BlockHash, ClientId, Payload, ProtocolMessage, ReplicaId, ViewNumber};

/// What a replica tells a client once the command's enclosing block
/// reaches DECIDE (§6.3). Application-level execution output is out of
/// scope (§1); this is the consensus layer's half of the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub client_id: ClientId,
    pub request_id: u64,
    pub block_hash: BlockHash,
    pub view: ViewNumber,
}

/// Operations the replica core's imperative shell performs on its behalf
/// (§4.3). The pure `ReplicaState` handlers never call these directly —
/// they return a [`crate::replica::ReplicaOutput`] describing what should
/// be sent, and the shell executes it against a `Transport`.
pub trait Transport {
    fn send(&self, dst: ReplicaId, msg: ProtocolMessage);
    /// Sends to every known replica, including self (self-delivery is a
    /// direct local inbox push, not a network round-trip).
    fn broadcast(&self, msg: ProtocolMessage);
    fn client_respond(&self, result: CommandResult);
}

/// In-memory transport for the deterministic test harness (§8.1) and the
/// fault-injection overlays (§4.4). Every replica in a simulated cluster
/// shares one peer map; sending writes onto the destination's channel,
/// read by that replica's own inbox loop.
#[derive(Clone)]
pub struct ChannelTransport {
    self_id: ReplicaId,
    peers: Arc<HashMap<ReplicaId, Sender<Payload>>>,
    client_replies: Arc<Mutex<Vec<CommandResult>>>,
}

impl ChannelTransport {
    /// Builds one [`ChannelTransport`] + inbox [`Receiver`] per id in
    /// `replica_ids`, all sharing one peer map and one client-reply log.
    pub fn cluster(replica_ids: &[ReplicaId]) -> (HashMap<ReplicaId, ChannelTransport>, HashMap<ReplicaId, Receiver<Payload>>) {
        let mut senders = HashMap::new();
        let mut receivers = HashMap::new();
        for &id in replica_ids {
            let (tx, rx) = std::sync::mpsc::channel();
            senders.insert(id, tx);
            receivers.insert(id, rx);
        }
        let peers = Arc::new(senders);
        let client_replies = Arc::new(Mutex::new(Vec::new()));
        let transports = replica_ids
            .iter()
            .map(|&id| {
                (
                    id,
                    ChannelTransport {
                        self_id: id,
                        peers: Arc::clone(&peers),
                        client_replies: Arc::clone(&client_replies),
                    },
                )
            })
            .collect();
        (transports, receivers)
    }

    pub fn self_id(&self) -> ReplicaId {
        self.self_id
    }

    /// Snapshot of every reply recorded so far, for test assertions.
    pub fn client_replies(&self) -> Vec<CommandResult> {
        self.client_replies.lock().expect("client reply log poisoned").clone()
    }

    fn send_to(&self, dst: ReplicaId, msg: ProtocolMessage) -> Result<(), SendError<Payload>> {
        match self.peers.get(&dst) {
            Some(tx) => tx.send(Payload::Protocol(msg)),
            None => Ok(()), // unknown peer: drop, matching §7's silent-drop taxonomy
        }
    }
}

impl Transport for ChannelTransport {
    fn send(&self, dst: ReplicaId, msg: ProtocolMessage) {
        let _ = self.send_to(dst, msg);
    }

    fn broadcast(&self, msg: ProtocolMessage) {
        for &dst in self.peers.keys() {
            let _ = self.send_to(dst, msg.clone());
        }
    }

    fn client_respond(&self, result: CommandResult) {
        self.client_replies
            .lock()
            .expect("client reply log poisoned")
            .push(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotstuff_types::{Block, MessageKind, QC};

    #[test]
    fn broadcast_reaches_every_replica_including_self() {
        let ids: Vec<ReplicaId> = (0..4).map(ReplicaId::new).collect();
        let (transports, receivers) = ChannelTransport::cluster(&ids);

        let msg = ProtocolMessage::new_view(ViewNumber::new(1), ReplicaId::new(0), QC::genesis());
        transports[&ReplicaId::new(0)].broadcast(msg);

        for id in &ids {
            let payload = receivers[id].try_recv().expect("every replica should receive the broadcast");
            assert!(matches!(payload, Payload::Protocol(_)));
        }
    }

    #[test]
    fn unicast_reaches_only_the_destination() {
        let ids: Vec<ReplicaId> = (0..4).map(ReplicaId::new).collect();
        let (transports, receivers) = ChannelTransport::cluster(&ids);

        let block = Block::genesis();
        let vote = ProtocolMessage::vote(MessageKind::PrepareVote, ViewNumber::new(1), ReplicaId::new(1), block, vec![]);
        transports[&ReplicaId::new(1)].send(ReplicaId::new(0), vote);

        assert!(receivers[&ReplicaId::new(0)].try_recv().is_ok());
        assert!(receivers[&ReplicaId::new(2)].try_recv().is_err());
    }

    #[test]
    fn client_replies_are_recorded() {
        let ids: Vec<ReplicaId> = (0..1).map(ReplicaId::new).collect();
        let (transports, _receivers) = ChannelTransport::cluster(&ids);
        transports[&ReplicaId::new(0)].client_respond(CommandResult {
            client_id: ClientId::new(7),
            request_id: 1,
            block_hash: BlockHash::GENESIS,
            view: ViewNumber::new(1),
        });
        assert_eq!(transports[&ReplicaId::new(0)].client_replies().len(), 1);
    }
}
