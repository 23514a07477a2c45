//! Imperative shell (§5.1): one `tokio` task per local replica, draining
//! `hotstuff-net::TcpTransport`'s inbox, dispatching to the pure
//! `ReplicaState` handlers, executing the resulting `ReplicaOutput`
//! against the transport, and polling the pacemaker for view timeouts.
//!
//! The pure core itself never names `tokio` — this module is where the
//! async runtime and the replica core meet, exactly as `kimberlite-vsr`'s
//! own `tests.rs` drives `ReplicaState` synchronously while the teacher's
//! production shell drives it from an async loop.

use std::sync::Arc;
use std::time::Duration;

use hotstuff_core::instrumentation::METRICS;
use hotstuff_core::{
    ClusterConfig, CrashPolicy, DelayedPolicy, FaultPolicy, HonestPolicy, MaliciousPolicy, Outbound, Pacemaker, ReplicaState, SystemClock, Transport,
};
use hotstuff_net::{AddressBook, TcpTransport};
use hotstuff_types::{MessageKind, Payload, ProtocolMessage, ReplicaId, ViewNumber};
use tracing::{info, instrument};

use crate::config::{FaultType, NodeConfig};

fn dispatch(state: ReplicaState, msg: ProtocolMessage) -> (ReplicaState, hotstuff_core::ReplicaOutput) {
    match msg.kind {
        MessageKind::NewView => state.on_new_view(msg),
        MessageKind::Prepare => state.on_prepare(msg),
        MessageKind::PrepareVote => state.on_prepare_vote(msg),
        MessageKind::PreCommit => state.on_precommit(msg),
        MessageKind::PreCommitVote => state.on_precommit_vote(msg),
        MessageKind::Commit => state.on_commit(msg),
        MessageKind::CommitVote => state.on_commit_vote(msg),
        MessageKind::Decide => state.on_decide(msg),
    }
}

fn build_policy(config: &NodeConfig, id: ReplicaId) -> anyhow::Result<Box<dyn FaultPolicy>> {
    let entry = config.entry_for(id)?;
    Ok(match entry.fault_type {
        FaultType::Honest => Box::new(HonestPolicy),
        FaultType::Crash => {
            let crash_view = entry.crash_view.unwrap_or(u64::MAX);
            Box::new(CrashPolicy { crash_view: ViewNumber::new(crash_view) })
        }
        FaultType::Delayed => Box::new(DelayedPolicy { per_view_delay: Duration::from_millis(50) }),
        FaultType::Malicious => Box::new(MaliciousPolicy {
            equivocate_view: ViewNumber::new(1),
            alternate_for: Box::new(|dst, msg| {
                let base = msg.block.clone().unwrap();
                let mut cmds = base.cmds.clone();
                cmds.push(hotstuff_types::Command::new("EQUIVOCATE", vec![dst.to_string()], hotstuff_types::ClientId::new(0), 0));
                ProtocolMessage::prepare(msg.view, msg.sender, hotstuff_types::Block::new(cmds, base.parent_hash, msg.view), msg.justify.clone().unwrap())
            }),
        }),
    })
}

/// Applies a [`hotstuff_core::ReplicaOutput`] against the transport,
/// running every outbound message through the replica's [`FaultPolicy`]
/// first (§4.4): a delayed policy defers the send, a malicious policy may
/// substitute a per-recipient payload, and either may drop a message
/// outright by omitting it from the policy's returned set.
fn execute(output: hotstuff_core::ReplicaOutput, transport: &Arc<TcpTransport>, policy: &Arc<dyn FaultPolicy>) {
    for item in output.messages {
        match item {
            Outbound::Unicast(dst, msg) => {
                if let Some((msg, delay)) = policy.on_send(dst, msg) {
                    spawn_delayed_send(Arc::clone(transport), dst, msg, delay);
                }
            }
            Outbound::Broadcast(msg) => {
                let recipients = transport.peer_ids();
                for (dst, msg, delay) in policy.on_broadcast(&recipients, &msg) {
                    spawn_delayed_send(Arc::clone(transport), dst, msg, delay);
                }
                // self-delivery (§4.3) always goes straight to the local
                // inbox, bypassing the per-peer fault policy — a replica
                // cannot equivocate or delay a message to itself.
                transport.broadcast_self_only(msg);
            }
            Outbound::ClientReply(result) => {
                METRICS.increment_messages_sent();
                transport.client_respond(result);
            }
        }
    }
}

fn spawn_delayed_send(transport: Arc<TcpTransport>, dst: ReplicaId, msg: ProtocolMessage, delay: Duration) {
    METRICS.increment_messages_sent();
    if delay.is_zero() {
        transport.send(dst, msg);
        return;
    }
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        transport.send(dst, msg);
    });
}

/// Runs one replica's event loop until the process is killed. Never
/// returns on the happy path.
#[instrument(skip(config), fields(replica = %id))]
pub async fn run_replica(id: ReplicaId, config: NodeConfig) -> anyhow::Result<()> {
    let cluster: ClusterConfig = config.cluster_config();
    let book: AddressBook = config.address_book()?;
    let policy: Arc<dyn FaultPolicy> = Arc::from(build_policy(&config, id)?);

    let (transport, mut inbox) = TcpTransport::bind(id, book).await?;
    let transport = Arc::new(transport);
    let mut state = ReplicaState::new(id, cluster);
    let mut pacemaker = Pacemaker::new(SystemClock::new(), config.view_timeout());

    let (mut started, output) = state.start_new_view(ViewNumber::new(1));
    state = started;
    execute(output, &transport, &policy);
    pacemaker.arm(state.current_view);

    let mut ticker = tokio::time::interval(Duration::from_millis(50));
    loop {
        tokio::select! {
            payload = inbox.recv() => {
                let Some(payload) = payload else {
                    info!("inbox closed, shutting down replica");
                    return Ok(());
                };
                METRICS.increment_messages_received();
                if policy.should_halt(state.current_view) {
                    continue;
                }
                let (next, output) = match payload {
                    Payload::Protocol(msg) => dispatch(state, msg),
                    Payload::Command(cmd) => state.on_client_command(cmd),
                };
                state = next;
                pacemaker.arm(state.current_view);
                execute(output, &transport, &policy);
            }
            _ = ticker.tick() => {
                if policy.should_halt(state.current_view) {
                    continue;
                }
                if let Some(_timeout) = pacemaker.poll() {
                    let (next, output) = state.on_view_timeout();
                    state = next;
                    pacemaker.arm(state.current_view);
                    execute(output, &transport, &policy);
                    info!(view = %state.current_view, "pacemaker advanced the view");
                }
            }
        }
    }
}
