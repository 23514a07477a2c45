//! [`Command`]: the opaque client operation consensus orders but never interprets.

use serde::{Deserialize, Serialize};

use crate::hash::BlockHash;
use crate::ids::ClientId;

/// A single client operation, opaque to the replication protocol except for
/// hashing (§3). What `op`/`args` *mean* is the application's concern,
/// out of scope for this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub op: String,
    pub args: Vec<String>,
    pub client_id: ClientId,
    /// Optional per-client sequence number; used only by the client library
    /// to match replies to outstanding requests, never consulted by the core.
    pub request_id: u64,
}

impl Command {
    pub fn new(op: impl Into<String>, args: Vec<String>, client_id: ClientId, request_id: u64) -> Self {
        Self {
            op: op.into(),
            args,
            client_id,
            request_id,
        }
    }

    /// `hash` over the canonical fields of the command. Commands do not
    /// carry a cached hash field (unlike [`crate::Block`]) because they are
    /// never looked up by hash; this is exposed for application-layer
    /// idempotency tracking.
    pub fn hash(&self) -> BlockHash {
        let mut buf = Vec::new();
        buf.extend_from_slice(self.op.as_bytes());
        for arg in &self.args {
            buf.extend_from_slice(arg.as_bytes());
        }
        buf.extend_from_slice(&self.client_id.as_u64().to_be_bytes());
        buf.extend_from_slice(&self.request_id.to_be_bytes());
        BlockHash::digest(&buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_for_equal_commands() {
        let a = Command::new("SET", vec!["A".into(), "10".into()], ClientId::new(1), 0);
        let b = Command::new("SET", vec!["A".into(), "10".into()], ClientId::new(1), 0);
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn hash_differs_on_args() {
        let a = Command::new("SET", vec!["A".into(), "10".into()], ClientId::new(1), 0);
        let b = Command::new("SET", vec!["A".into(), "11".into()], ClientId::new(1), 0);
        assert_ne!(a.hash(), b.hash());
    }
}
