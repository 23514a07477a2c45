//! [`Client`]: submits a `Command` to the cluster and waits for `F+1`
//! matching replies (§6.3) — enough that at least one honest replica is
//! among the agreeing set regardless of which `F` are Byzantine.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use hotstuff_net::{read_frame, write_frame};
use hotstuff_types::{ClientId, Command, Payload};
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("i/o error")]
    Io(#[from] std::io::Error),
    #[error("framing error")]
    Framing(#[from] hotstuff_net::FramingError),
    #[error("timed out waiting for replies")]
    Timeout,
    #[error("received only {got} matching replies, needed {needed}")]
    InsufficientReplies { got: usize, needed: usize },
}

/// A cluster confirmation: the block hash and view the submitted command
/// was committed in, as reported by at least `F+1` replicas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub block_hash: String,
    pub view: String,
    pub replies: usize,
}

pub struct Client {
    pub id: ClientId,
    pub replicas: Vec<SocketAddr>,
    pub f: usize,
    pub timeout: Duration,
}

impl Client {
    pub fn new(id: ClientId, replicas: Vec<SocketAddr>, f: usize, timeout: Duration) -> Self {
        Self { id, replicas, f, timeout }
    }

    /// Sends `cmd` to every configured replica concurrently and waits for
    /// `F+1` replies agreeing on the same `(block_hash, view)` (§6.3) — only
    /// the current leader among the replicas will actually drive the
    /// command to a decision promptly, so the replicas must be raced rather
    /// than polled one at a time. Each reply is the consensus-layer
    /// `COMMITTED` echo `hotstuff-net::TcpTransport` produces; the
    /// application-level result is out of scope (§1).
    pub async fn submit(&self, cmd: Command) -> Result<Confirmation, ClientError> {
        let needed = self.f + 1;
        let deadline = tokio::time::Instant::now() + self.timeout;
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<(String, String)>();

        for &addr in &self.replicas {
            let tx = tx.clone();
            let cmd = cmd.clone();
            let timeout = self.timeout;
            tokio::spawn(async move {
                match tokio::time::timeout(timeout, Self::send_and_await_reply(addr, cmd)).await {
                    Ok(Ok(reply)) => {
                        let _ = tx.send(reply);
                    }
                    Ok(Err(err)) => warn!(%addr, %err, "replica did not answer"),
                    Err(_) => warn!(%addr, "replica timed out"),
                }
            });
        }
        drop(tx);

        let mut tally: HashMap<(String, String), usize> = HashMap::new();
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, rx.recv()).await {
                Ok(Some((block_hash, view))) => {
                    let count = tally.entry((block_hash, view)).or_insert(0);
                    *count += 1;
                    if *count >= needed {
                        let ((block_hash, view), replies) = tally.into_iter().find(|(_, c)| *c >= needed).unwrap();
                        return Ok(Confirmation { block_hash, view, replies });
                    }
                }
                Ok(None) => break, // every task finished without reaching quorum
                Err(_) => break,   // overall deadline elapsed
            }
        }

        let got = tally.values().copied().max().unwrap_or(0);
        Err(ClientError::InsufficientReplies { got, needed })
    }

    async fn send_and_await_reply(addr: SocketAddr, cmd: Command) -> Result<(String, String), ClientError> {
        let mut stream = TcpStream::connect(addr).await?;
        write_frame(&mut stream, &Payload::Command(cmd.clone())).await?;

        loop {
            let payload = read_frame(&mut stream).await?;
            if let Payload::Command(echo) = payload {
                if echo.op == "COMMITTED" && echo.request_id == cmd.request_id && echo.client_id == cmd.client_id {
                    debug!(%addr, "received commit confirmation");
                    return Ok((echo.args[0].clone(), echo.args[1].clone()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_threshold_is_f_plus_one() {
        let client = Client::new(ClientId::new(1), vec![], 1, Duration::from_secs(1));
        assert_eq!(client.f + 1, 2);
    }
}
