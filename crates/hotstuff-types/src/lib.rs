//! # hotstuff-types: core protocol types for the HotStuff BFT replica
//!
//! Immutable value objects shared by every other crate in this workspace:
//! [`Block`], [`QC`], [`ProtocolMessage`], [`Command`], the phase tags, and
//! the identifier newtypes ([`ReplicaId`], [`ViewNumber`], [`ClientId`]).
//!
//! Nothing in this crate performs I/O, reads a clock, or depends on a
//! runtime — it is the pure vocabulary the replica state machine in
//! `hotstuff-core` is built from.

mod block;
mod command;
mod hash;
mod ids;
mod message;
mod qc;

pub use block::Block;
pub use command::Command;
pub use hash::{BlockHash, HASH_LENGTH};
pub use ids::{ClientId, ReplicaId, ViewNumber};
pub use message::{MessageKind, Payload, ProtocolMessage};
pub use qc::{Phase, QC};
