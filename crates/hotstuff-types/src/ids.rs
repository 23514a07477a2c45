//! Small `Copy` newtypes for protocol identifiers and counters.
//!
//! Mirrors the entity-id convention used throughout the replication layer
//! this crate is descended from: every domain concept gets its own
//! zero-cost wrapper instead of a bare `u64`, so the compiler rejects
//! `view == replica_id` nonsense at the type level.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Identifies one of the `N` replicas in the cluster (`0..N`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReplicaId(u64);

impl ReplicaId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ReplicaId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<ReplicaId> for u64 {
    fn from(id: ReplicaId) -> Self {
        id.0
    }
}

/// A view number: a monotonically increasing leader term.
///
/// (I4) `current_view` never decreases for an honest replica.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ViewNumber(u64);

impl ViewNumber {
    pub const GENESIS: ViewNumber = ViewNumber(0);

    pub fn new(v: u64) -> Self {
        Self(v)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// The next view after this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// `leader(v) := v mod n` — round-robin leader selection (§4.2).
    pub fn leader(self, n: u64) -> ReplicaId {
        ReplicaId::new(self.0 % n)
    }
}

impl Display for ViewNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ViewNumber {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Identifies the client that submitted a [`crate::Command`], for routing replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClientId(u64);

impl ClientId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ClientId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
