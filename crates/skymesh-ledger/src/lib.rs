//! Append-only ledger of swarm events.
//!
//! Every node keeps its own replica of the chain. Transactions (signed
//! [`SwarmMessage`]s) accumulate in an open block; when the open block
//! reaches the seal threshold it is sealed into a *candidate* linked to the
//! previous accepted block's transaction digest, a proof token is mined
//! against the current difficulty, and the candidate enters the voting
//! round. A round commits when a strict majority of structurally identical
//! candidates (same id and digest) is present.
//!
//! # Chain invariant
//!
//! ```text
//! chain[i].previous_hash == digest(chain[i-1].transactions)   for all i > 0
//! ```
//!
//! The digest is recomputed locally, never trusted from the network, and is
//! order-sensitive: reordering or altering any committed transaction breaks
//! validation.
//!
//! [`SwarmMessage`]: skymesh_protocol::SwarmMessage

mod block;
mod engine;

pub use block::{digest_transactions, Block, TxDigest};
pub use engine::{Ledger, SEAL_THRESHOLD};

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger protocol errors.
///
/// These are always handled locally: an invalid block or candidate is
/// discarded and counted, never propagated to peers as a failure.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// No block exists yet; the genesis block must be created first.
    #[error("ledger has no blocks; create the genesis block first")]
    EmptyChain,

    /// A block's recomputed transaction digest does not match its header.
    #[error("block {0} carries a digest that does not match its transactions")]
    InvalidDigest(u64),

    /// A block does not link to the last accepted block.
    #[error("block {0} does not link to the chain head")]
    InvalidLink(u64),

    /// A sealed block must carry at least one transaction.
    #[error("block {0} has no transactions")]
    EmptyBlock(u64),

    /// The proof token does not satisfy the difficulty predicate.
    #[error("block {0} proof token fails the difficulty predicate")]
    InvalidProof(u64),
}
