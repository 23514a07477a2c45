//! Layered configuration (§6.4, §7.1): compiled-in defaults, overridden by
//! an optional TOML file, overridden by `HOTSTUFF_*`-prefixed environment
//! variables — the same three-tier precedence as `kimberlite-config::loader`,
//! built on the same `config` crate plus `serde`/`toml`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use hotstuff_net::AddressBook;
use hotstuff_types::ReplicaId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("i/o error reading config file")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),
    #[error("failed to load layered config")]
    Layered(#[from] config::ConfigError),
    #[error("cluster requires n >= 3f + 1, got n={n} f={f}")]
    InvalidQuorum { n: usize, f: usize },
    #[error("address book has no entry for replica {0}")]
    UnknownReplicaInAddressBook(ReplicaId),
}

/// Which fault overlay a replica runs under (§4.4). `Honest` is the only
/// variant a production deployment should ever set; the others exist for
/// the test harness and demo clusters exercising §8's scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FaultType {
    #[default]
    Honest,
    Crash,
    Delayed,
    Malicious,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaEntry {
    pub replica_id: u64,
    pub bind_host: String,
    pub bind_port: u16,
    #[serde(default)]
    pub fault_type: FaultType,
    /// Required when `fault_type == Crash`: the view at which this
    /// replica's inbox loop halts (§4.4).
    pub crash_view: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub n: usize,
    pub f: usize,
    #[serde(default = "default_view_timeout_ms")]
    pub view_timeout_ms: u64,
    pub replicas: Vec<ReplicaEntry>,
}

fn default_view_timeout_ms() -> u64 {
    2_000
}

impl NodeConfig {
    /// Loads defaults, overlays an optional TOML file, then
    /// `HOTSTUFF_*`-prefixed environment variables, matching
    /// `kimberlite-config::loader`'s precedence (§6.4).
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder().add_source(config::Config::try_from(&Self::defaults())?);
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(config::Environment::with_prefix("HOTSTUFF").separator("__"));
        let settings = builder.build()?;
        let cfg: NodeConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn defaults() -> Self {
        Self {
            n: 4,
            f: 1,
            view_timeout_ms: default_view_timeout_ms(),
            replicas: Vec::new(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.n < 3 * self.f + 1 {
            return Err(ConfigError::InvalidQuorum { n: self.n, f: self.f });
        }
        Ok(())
    }

    pub fn view_timeout(&self) -> Duration {
        Duration::from_millis(self.view_timeout_ms)
    }

    pub fn cluster_config(&self) -> hotstuff_core::ClusterConfig {
        hotstuff_core::ClusterConfig::new(self.n, self.f).expect("validated at load time")
    }

    pub fn address_book(&self) -> Result<AddressBook, ConfigError> {
        let mut entries = HashMap::new();
        for replica in &self.replicas {
            let addr: SocketAddr = format!("{}:{}", replica.bind_host, replica.bind_port)
                .parse()
                .map_err(|_| ConfigError::UnknownReplicaInAddressBook(ReplicaId::new(replica.replica_id)))?;
            entries.insert(ReplicaId::new(replica.replica_id), addr);
        }
        Ok(AddressBook::new(entries))
    }

    pub fn entry_for(&self, id: ReplicaId) -> Result<&ReplicaEntry, ConfigError> {
        self.replicas
            .iter()
            .find(|r| r.replica_id == id.as_u64())
            .ok_or(ConfigError::UnknownReplicaInAddressBook(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_satisfy_the_quorum_invariant() {
        assert!(NodeConfig::defaults().validate().is_ok());
    }

    #[test]
    fn rejects_an_undersized_cluster() {
        let mut cfg = NodeConfig::defaults();
        cfg.n = 3;
        cfg.f = 1;
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidQuorum { n: 3, f: 1 })));
    }

    #[test]
    fn loads_a_toml_file_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster.toml");
        std::fs::write(
            &path,
            r#"
            n = 4
            f = 1
            view_timeout_ms = 500

            [[replicas]]
            replica_id = 0
            bind_host = "127.0.0.1"
            bind_port = 9000
            "#,
        )
        .unwrap();

        let cfg = NodeConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.view_timeout_ms, 500);
        assert_eq!(cfg.replicas.len(), 1);
    }
}
