//! Replica binary entry point (§2, §6.4): loads layered configuration,
//! initializes `tracing`, and drives one replica's event loop to
//! completion, modeled on `kimberlite-cli`'s `clap`-derived binaries.

mod config;
mod runtime;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use hotstuff_types::ReplicaId;

use config::NodeConfig;

/// Run a single HotStuff replica process.
#[derive(Debug, Parser)]
struct Args {
    /// This process's replica id; must have a matching entry in the cluster config.
    #[arg(long)]
    replica_id: u64,

    /// Path to a cluster config TOML file. Falls back to compiled-in
    /// defaults overridden by `HOTSTUFF__*` environment variables.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let cfg = NodeConfig::load(args.config.as_deref()).context("failed to load cluster configuration")?;
    let id = ReplicaId::new(args.replica_id);
    cfg.entry_for(id).context("replica id has no entry in the cluster config")?;

    runtime::run_replica(id, cfg).await
}
