//! CLI entry point for submitting one command to a HotStuff cluster,
//! modeled on `kimberlite-cli`'s `clap`-derived subcommands and
//! `anyhow`-returning `main`.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use hotstuff_client::Client;
use hotstuff_types::{ClientId, Command};

/// Submit a command to a HotStuff BFT cluster and wait for quorum confirmation.
#[derive(Debug, Parser)]
struct Args {
    /// Replica addresses to contact, e.g. --replica 127.0.0.1:9000
    #[arg(long = "replica", required = true)]
    replicas: Vec<SocketAddr>,

    /// Maximum tolerated Byzantine replicas; the client waits for F+1 matching replies.
    #[arg(long, default_value_t = 1)]
    f: usize,

    /// This client's identifier.
    #[arg(long, default_value_t = 1)]
    client_id: u64,

    /// Per-client request sequence number.
    #[arg(long, default_value_t = 1)]
    request_id: u64,

    /// Overall timeout for gathering replies.
    #[arg(long, default_value_t = 5)]
    timeout_secs: u64,

    /// The operation name, e.g. SET.
    op: String,

    /// Operation arguments, e.g. A 10.
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let client = Client::new(
        ClientId::new(args.client_id),
        args.replicas,
        args.f,
        Duration::from_secs(args.timeout_secs),
    );
    let cmd = Command::new(args.op, args.args, ClientId::new(args.client_id), args.request_id);

    let confirmation = client
        .submit(cmd)
        .await
        .context("failed to reach quorum confirmation from the cluster")?;

    println!(
        "committed: block_hash={} view={} (confirmed by {} replicas)",
        confirmation.block_hash, confirmation.view, confirmation.replies
    );
    Ok(())
}
