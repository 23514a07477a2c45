//! Fault-injection overlays (§4.4): variant transport behaviors used to
//! exercise safety and liveness under crash, delay, and equivocation.
//!
//! A single `FaultPolicy` trait replaces the dynamic "variant replica via
//! subclassing" pattern the original calls out in §9 — composition over
//! inheritance: one `Replica`/transport pairing holds a policy object, and
//! crash/delayed/malicious behavior is three implementations of the same
//! three hooks. Modeled on `kimberlite-sim::byzantine::ByzantineInjector`'s
//! builder-style configuration and `kimberlite-sim::adapters::crash::CrashController`'s
//! trait-with-production-no-op-impl shape.

use std::time::Duration;

use hotstuff_types::{MessageKind, ProtocolMessage, ReplicaId, ViewNumber};

/// Hooks the transport shell consults before acting on a `ReplicaOutput`.
/// `HonestPolicy` is the production default: every hook passes the message
/// through unmodified and `should_halt` never fires.
pub trait FaultPolicy: Send + Sync {
    /// Called before a unicast send. Returns the (possibly delayed,
    /// possibly substituted) message, or `None` to drop it silently.
    fn on_send(&self, dst: ReplicaId, msg: ProtocolMessage) -> Option<(ProtocolMessage, Duration)>;

    /// Called before a broadcast, once per recipient, so a malicious
    /// policy can substitute a distinct message per recipient
    /// (equivocation). Recipients absent from the returned vec receive
    /// nothing.
    fn on_broadcast(&self, recipients: &[ReplicaId], msg: &ProtocolMessage) -> Vec<(ReplicaId, ProtocolMessage, Duration)>;

    /// Whether the replica's inbox loop should stop draining at `view`.
    fn should_halt(&self, view: ViewNumber) -> bool;
}

/// Pass-through policy: production behavior, and the baseline every other
/// policy in this module falls back to outside its specific fault window.
#[derive(Debug, Default, Clone, Copy)]
pub struct HonestPolicy;

impl FaultPolicy for HonestPolicy {
    fn on_send(&self, _dst: ReplicaId, msg: ProtocolMessage) -> Option<(ProtocolMessage, Duration)> {
        Some((msg, Duration::ZERO))
    }

    fn on_broadcast(&self, recipients: &[ReplicaId], msg: &ProtocolMessage) -> Vec<(ReplicaId, ProtocolMessage, Duration)> {
        recipients.iter().map(|&dst| (dst, msg.clone(), Duration::ZERO)).collect()
    }

    fn should_halt(&self, _view: ViewNumber) -> bool {
        false
    }
}

/// CRASH(v) (§4.4): identical to honest until `current_view == crash_view`,
/// at which point the inbox loop exits.
#[derive(Debug, Clone, Copy)]
pub struct CrashPolicy {
    pub crash_view: ViewNumber,
}

impl FaultPolicy for CrashPolicy {
    fn on_send(&self, dst: ReplicaId, msg: ProtocolMessage) -> Option<(ProtocolMessage, Duration)> {
        HonestPolicy.on_send(dst, msg)
    }

    fn on_broadcast(&self, recipients: &[ReplicaId], msg: &ProtocolMessage) -> Vec<(ReplicaId, ProtocolMessage, Duration)> {
        HonestPolicy.on_broadcast(recipients, msg)
    }

    fn should_halt(&self, view: ViewNumber) -> bool {
        view >= self.crash_view
    }
}

/// DELAYED (§4.4): sleeps proportional to the message's view before every
/// send, triggering pacemaker-driven view changes under load.
#[derive(Debug, Clone, Copy)]
pub struct DelayedPolicy {
    pub per_view_delay: Duration,
}

impl DelayedPolicy {
    fn delay_for(&self, view: ViewNumber) -> Duration {
        self.per_view_delay * u32::try_from(view.as_u64()).unwrap_or(u32::MAX)
    }
}

impl FaultPolicy for DelayedPolicy {
    fn on_send(&self, _dst: ReplicaId, msg: ProtocolMessage) -> Option<(ProtocolMessage, Duration)> {
        let delay = self.delay_for(msg.view);
        Some((msg, delay))
    }

    fn on_broadcast(&self, recipients: &[ReplicaId], msg: &ProtocolMessage) -> Vec<(ReplicaId, ProtocolMessage, Duration)> {
        let delay = self.delay_for(msg.view);
        recipients.iter().map(|&dst| (dst, msg.clone(), delay)).collect()
    }

    fn should_halt(&self, _view: ViewNumber) -> bool {
        false
    }
}

/// MALICIOUS leader (§4.4): on broadcast of a `PREPARE` at `equivocate_view`,
/// substitutes a distinct block per recipient. A correct quorum system
/// must not commit under this attack (P6).
pub struct MaliciousPolicy {
    pub equivocate_view: ViewNumber,
    pub alternate_for: Box<dyn Fn(ReplicaId, &ProtocolMessage) -> ProtocolMessage + Send + Sync>,
}

impl FaultPolicy for MaliciousPolicy {
    fn on_send(&self, dst: ReplicaId, msg: ProtocolMessage) -> Option<(ProtocolMessage, Duration)> {
        HonestPolicy.on_send(dst, msg)
    }

    fn on_broadcast(&self, recipients: &[ReplicaId], msg: &ProtocolMessage) -> Vec<(ReplicaId, ProtocolMessage, Duration)> {
        if msg.kind != MessageKind::Prepare || msg.view != self.equivocate_view {
            return HonestPolicy.on_broadcast(recipients, msg);
        }
        recipients
            .iter()
            .map(|&dst| (dst, (self.alternate_for)(dst, msg), Duration::ZERO))
            .collect()
    }

    fn should_halt(&self, _view: ViewNumber) -> bool {
        false
    }
}
