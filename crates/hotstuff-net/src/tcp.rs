//! [`TcpTransport`]: the production implementation of
//! `hotstuff_core::Transport` (§4.3, §6.1–§6.3).
//!
//! One writer task per outbound peer connection, fed by an unbounded
//! channel — `Transport::send`/`broadcast` are synchronous from the
//! replica core's point of view (they just push onto a channel), matching
//! the pure core never awaiting anything (§5.1). A single accept loop
//! reads both replica and client connections; the first `Command` read
//! from a connection binds that connection's `ClientId` to its write-half
//! sender (§6.2's "binding happens the first time any Command is read").
//!
//! Retries on a broken outbound connection are capped at 3 with a fixed
//! back-off (§7); beyond that the peer is dropped and the pacemaker is
//! left to escalate via a view change.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hotstuff_core::{CommandResult, Transport};
use hotstuff_types::{ClientId, Command, Payload, ProtocolMessage, ReplicaId};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::address_book::{AddressBook, AddressBookError};
use crate::framing::{read_frame, write_frame, FramingError};

const MAX_SEND_RETRIES: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("i/o error")]
    Io(#[from] std::io::Error),
    #[error("framing error")]
    Framing(#[from] FramingError),
    #[error("no address book entry for replica {0}")]
    UnknownReplica(#[from] AddressBookError),
    #[error("connection closed")]
    ConnectionClosed,
}

/// Production transport. Construct with [`TcpTransport::bind`], which
/// starts the accept loop and returns the inbound channel the replica's
/// event loop reads from.
pub struct TcpTransport {
    self_id: ReplicaId,
    book: AddressBook,
    peer_writers: Arc<Mutex<HashMap<ReplicaId, mpsc::UnboundedSender<Payload>>>>,
    client_writers: Arc<Mutex<HashMap<ClientId, mpsc::UnboundedSender<Payload>>>>,
    /// Loops a broadcast straight back onto this replica's own inbox
    /// (§4.3's self-delivery shortcut): the leader is also a voter, and a
    /// real socket connection to oneself would be pointless.
    self_inbox: mpsc::UnboundedSender<Payload>,
}

impl TcpTransport {
    /// Binds the local listener for `self_id` and starts one outbound
    /// writer task per peer in `book`. Returns the transport plus the
    /// inbound payload channel (the replica's inbox, per §4.3).
    pub async fn bind(self_id: ReplicaId, book: AddressBook) -> Result<(Self, mpsc::UnboundedReceiver<Payload>), TransportError> {
        let bind_addr = book.lookup(self_id)?;
        let listener = TcpListener::bind(bind_addr).await?;

        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let client_writers: Arc<Mutex<HashMap<ClientId, mpsc::UnboundedSender<Payload>>>> = Arc::new(Mutex::new(HashMap::new()));

        let accept_inbox = inbox_tx.clone();
        let accept_clients = Arc::clone(&client_writers);
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        debug!(%peer, "accepted inbound connection");
                        spawn_reader(stream, accept_inbox.clone(), Arc::clone(&accept_clients));
                    }
                    Err(err) => {
                        warn!(%err, "accept loop error");
                        break;
                    }
                }
            }
        });

        let peer_writers = Arc::new(Mutex::new(HashMap::new()));
        for peer in book.replicas() {
            if peer == self_id {
                continue;
            }
            let addr = book.lookup(peer)?;
            let (tx, rx) = mpsc::unbounded_channel();
            peer_writers.lock().expect("peer writer map poisoned").insert(peer, tx);
            tokio::spawn(writer_task(peer, addr, rx));
        }

        Ok((
            Self {
                self_id,
                book,
                peer_writers,
                client_writers,
                self_inbox: inbox_tx,
            },
            inbox_rx,
        ))
    }

    pub fn self_id(&self) -> ReplicaId {
        self.self_id
    }

    /// Every replica this transport has an outbound writer for (i.e. every
    /// peer but `self_id`) — what a fault policy's `on_broadcast` fans a
    /// broadcast out to.
    pub fn peer_ids(&self) -> Vec<ReplicaId> {
        self.peer_writers.lock().expect("peer writer map poisoned").keys().copied().collect()
    }

    /// Delivers `msg` straight onto this replica's own inbox, bypassing
    /// the network and any per-peer fault policy (§4.3's self-delivery
    /// shortcut).
    pub fn broadcast_self_only(&self, msg: ProtocolMessage) {
        let _ = self.self_inbox.send(Payload::Protocol(msg));
    }
}

/// Reads frames off one accepted connection and forwards them to the
/// shared inbox; registers the connection's reply channel under the
/// sending client's id the first time a `Command` arrives.
fn spawn_reader(stream: TcpStream, inbox: mpsc::UnboundedSender<Payload>, client_writers: Arc<Mutex<HashMap<ClientId, mpsc::UnboundedSender<Payload>>>>) {
    tokio::spawn(async move {
        let (mut read_half, write_half) = stream.into_split();
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<Payload>();
        let mut write_half = write_half;
        tokio::spawn(async move {
            while let Some(payload) = reply_rx.recv().await {
                if write_frame(&mut write_half, &payload).await.is_err() {
                    break;
                }
            }
        });

        loop {
            match read_frame(&mut read_half).await {
                Ok(payload) => {
                    if let Payload::Command(ref cmd) = payload {
                        client_writers
                            .lock()
                            .expect("client writer map poisoned")
                            .entry(cmd.client_id)
                            .or_insert_with(|| reply_tx.clone());
                    }
                    if inbox.send(payload).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
}

async fn writer_task(peer: ReplicaId, addr: std::net::SocketAddr, mut rx: mpsc::UnboundedReceiver<Payload>) {
    loop {
        let Some(payload) = rx.recv().await else { return };
        let mut attempts = 0;
        loop {
            match send_once(addr, &payload).await {
                Ok(()) => break,
                Err(err) => {
                    attempts += 1;
                    warn!(%peer, %err, attempts, "send to peer failed");
                    if attempts >= MAX_SEND_RETRIES {
                        warn!(%peer, "dropping message after exhausting retries; pacemaker will escalate");
                        break;
                    }
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
            }
        }
    }
}

async fn send_once(addr: std::net::SocketAddr, payload: &Payload) -> Result<(), TransportError> {
    let mut stream = TcpStream::connect(addr).await?;
    write_frame(&mut stream, payload).await?;
    Ok(())
}

impl Transport for TcpTransport {
    fn send(&self, dst: ReplicaId, msg: ProtocolMessage) {
        let writers = self.peer_writers.lock().expect("peer writer map poisoned");
        if let Some(tx) = writers.get(&dst) {
            let _ = tx.send(Payload::Protocol(msg));
        } else {
            warn!(%dst, "send to unknown replica dropped");
        }
    }

    fn broadcast(&self, msg: ProtocolMessage) {
        let writers = self.peer_writers.lock().expect("peer writer map poisoned");
        for tx in writers.values() {
            let _ = tx.send(Payload::Protocol(msg.clone()));
        }
        drop(writers);
        let _ = self.self_inbox.send(Payload::Protocol(msg));
    }

    fn client_respond(&self, result: CommandResult) {
        let writers = self.client_writers.lock().expect("client writer map poisoned");
        if let Some(tx) = writers.get(&result.client_id) {
            // The application-level reply payload is out of scope (§1); we
            // carry the consensus-layer confirmation as a no-op Command
            // echo the client library interprets by `request_id`.
            let echo = Command::new("COMMITTED", vec![result.block_hash.to_string(), result.view.to_string()], result.client_id, result.request_id);
            let _ = tx.send(Payload::Command(echo));
        }
    }
}
