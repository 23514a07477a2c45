//! Cluster sizing: `N`, `F`, and the derived quorum size.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `N`/`F` plus the pacemaker timeout (§6.4). `hotstuff-node` layers a TOML
/// file and environment overrides on top of this; the address book itself
/// (host/port per replica) lives in `hotstuff-net`, since the pure replica
/// core never dials a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Total number of replicas.
    pub n: usize,
    /// Maximum tolerated Byzantine failures.
    pub f: usize,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ClusterConfigError {
    #[error("cluster requires n >= 3f + 1, got n={n} f={f}")]
    InsufficientReplicas { n: usize, f: usize },
}

impl ClusterConfig {
    /// Validates `N ≥ 3F+1` and constructs a config.
    pub fn new(n: usize, f: usize) -> Result<Self, ClusterConfigError> {
        if n < 3 * f + 1 {
            return Err(ClusterConfigError::InsufficientReplicas { n, f });
        }
        Ok(Self { n, f })
    }

    /// `QUORUM = 2F+1`: the smallest set guaranteed to contain one honest
    /// majority.
    pub fn quorum(&self) -> usize {
        2 * self.f + 1
    }
}

/// Pacemaker timing, kept separate from cluster sizing so tests can shrink
/// it independently (§4.2: "Timeouts are fixed (constant T, e.g. 2s)").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacemakerConfig {
    pub view_timeout: Duration,
}

impl Default for PacemakerConfig {
    fn default() -> Self {
        Self {
            view_timeout: Duration::from_secs(2),
        }
    }
}
