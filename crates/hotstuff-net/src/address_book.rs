//! The static `replica_id → (host, port)` mapping (§6.2). Loaded as part
//! of `hotstuff-node`'s layered `ClusterConfig` document; kept here
//! because it is the transport's concern, not the replica core's.

use std::collections::HashMap;
use std::net::SocketAddr;

use hotstuff_types::ReplicaId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AddressBookError {
    #[error("address book has no entry for replica {0}")]
    UnknownReplica(ReplicaId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressBook {
    entries: HashMap<ReplicaId, SocketAddr>,
}

impl AddressBook {
    pub fn new(entries: HashMap<ReplicaId, SocketAddr>) -> Self {
        Self { entries }
    }

    pub fn lookup(&self, id: ReplicaId) -> Result<SocketAddr, AddressBookError> {
        self.entries.get(&id).copied().ok_or(AddressBookError::UnknownReplica(id))
    }

    pub fn replicas(&self) -> impl Iterator<Item = ReplicaId> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_fails_for_an_unknown_replica() {
        let book = AddressBook::new(HashMap::new());
        assert!(matches!(book.lookup(ReplicaId::new(0)), Err(AddressBookError::UnknownReplica(_))));
    }

    #[test]
    fn lookup_succeeds_for_a_known_replica() {
        let mut entries = HashMap::new();
        entries.insert(ReplicaId::new(0), "127.0.0.1:9000".parse().unwrap());
        let book = AddressBook::new(entries);
        assert_eq!(book.lookup(ReplicaId::new(0)).unwrap().port(), 9000);
    }
}
