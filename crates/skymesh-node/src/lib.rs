//! The per-aircraft swarm node.
//!
//! A [`SwarmNode`] owns one aircraft's complete coordination state: its
//! ledger replica, position table, conflict resolver, airspace volumes,
//! replay guard and outbound nonce counter. Nothing else holds a mutable
//! reference to any of it; inbound messages are verified, replay-checked
//! and then applied by the node itself, so every state change goes through
//! one writer.
//!
//! The node advances in discrete ticks. Each [`tick`](SwarmNode::tick)
//! drains the transport, expires stale positions, scans for separation
//! conflicts, drives pending resolutions, adjusts consensus difficulty to
//! the swarm size, seals and votes on ledger blocks, and refreshes the
//! health snapshot. [`NodeRunner`] wraps the loop in a tokio task at the
//! configured update frequency.

mod config;
mod node;
mod runner;
mod transport;

pub use config::NodeConfig;
pub use node::{NodeStats, SwarmNode, TickReport, VolumeClaim};
pub use runner::NodeRunner;
pub use transport::{HubTransport, MessageHub, Transport};

use skymesh_identity::AircraftId;

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by node operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Ledger(#[from] skymesh_ledger::Error),

    #[error(transparent)]
    Airspace(#[from] skymesh_airspace::Error),

    #[error(transparent)]
    Conflict(#[from] skymesh_conflict::Error),

    #[error(transparent)]
    Protocol(#[from] skymesh_protocol::Error),

    /// An operation needed the local state vector before it was set.
    #[error("no position recorded for {0}")]
    NoLocalPosition(AircraftId),

    /// Every active airspace volume is held by another aircraft.
    #[error("no free airspace volume")]
    NoFreeVolume,
}
