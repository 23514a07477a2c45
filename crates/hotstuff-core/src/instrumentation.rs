//! Lock-free counters for the replica's hot path.
//!
//! Modeled on `kimberlite-vsr`'s `instrumentation::METRICS` singleton:
//! plain atomics behind a `'static`, no locks, safe to touch from every
//! handler. Scaled down to the counters this protocol's handlers actually
//! increment; a real deployment would export these to Prometheus the way
//! the teacher gates an `otel` feature in its own Cargo.toml.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics instance for one replica process.
pub static METRICS: Metrics = Metrics::new();

#[derive(Debug)]
pub struct Metrics {
    messages_sent_total: AtomicU64,
    messages_received_total: AtomicU64,
    votes_recorded_total: AtomicU64,
    quorums_formed_total: AtomicU64,
    blocks_committed_total: AtomicU64,
    view_changes_total: AtomicU64,
    replay_attempts_total: AtomicU64,
    dropped_unsafe_total: AtomicU64,
}

impl Metrics {
    const fn new() -> Self {
        Self {
            messages_sent_total: AtomicU64::new(0),
            messages_received_total: AtomicU64::new(0),
            votes_recorded_total: AtomicU64::new(0),
            quorums_formed_total: AtomicU64::new(0),
            blocks_committed_total: AtomicU64::new(0),
            view_changes_total: AtomicU64::new(0),
            replay_attempts_total: AtomicU64::new(0),
            dropped_unsafe_total: AtomicU64::new(0),
        }
    }

    pub fn increment_messages_sent(&self) {
        self.messages_sent_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_messages_received(&self) {
        self.messages_received_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_votes_recorded(&self) {
        self.votes_recorded_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_quorums_formed(&self) {
        self.quorums_formed_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_blocks_committed(&self) {
        self.blocks_committed_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_view_changes(&self) {
        self.view_changes_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_replay_attempts(&self) {
        self.replay_attempts_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_dropped_unsafe(&self) {
        self.dropped_unsafe_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn blocks_committed(&self) -> u64 {
        self.blocks_committed_total.load(Ordering::Relaxed)
    }

    pub fn view_changes(&self) -> u64 {
        self.view_changes_total.load(Ordering::Relaxed)
    }

    pub fn replay_attempts(&self) -> u64 {
        self.replay_attempts_total.load(Ordering::Relaxed)
    }
}
