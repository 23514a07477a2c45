//! # hotstuff-core: the replica state machine, transport port, pacemaker,
//! and fault-injection overlays for a HotStuff BFT replica.
//!
//! The pure [`replica::ReplicaState`] machine never performs I/O, reads a
//! clock, or depends on a runtime (FCIS — Functional Core, Imperative
//! Shell). Everything that touches a socket, a timer, or a sleep lives in
//! an imperative shell: `hotstuff-node`'s `tokio` runtime in production,
//! or this crate's own test harnesses for the deterministic scenarios in
//! `tests/`.

pub mod config;
pub mod fault;
pub mod instrumentation;
pub mod pacemaker;
pub mod replica;
pub mod transport;

pub use config::{ClusterConfig, ClusterConfigError, PacemakerConfig};
pub use fault::{CrashPolicy, DelayedPolicy, FaultPolicy, HonestPolicy, MaliciousPolicy};
pub use pacemaker::{Clock, ManualClock, Pacemaker, SystemClock, TimeoutKind};
pub use replica::{Outbound, ReplicaOutput, ReplicaState};
pub use transport::{ChannelTransport, CommandResult, Transport};
