//! # hotstuff-client: library half of the client + driver component (§2).
//!
//! A thin client that submits `Command`s to a configured subset of the
//! cluster and waits for `F+1` matching replies (§6.3), tolerating up to
//! `F` Byzantine replicas lying about the outcome.

mod client;

pub use client::{Client, ClientError, Confirmation};
