//! Per-sender nonce tracking.

use std::collections::HashMap;

use skymesh_identity::AircraftId;

use crate::SwarmMessage;

/// Rejects replayed or reordered messages.
///
/// Nonces must be strictly increasing per sender. A verified message whose
/// nonce is not greater than the last accepted nonce from that sender is a
/// replay and must be dropped.
#[derive(Debug, Default)]
pub struct ReplayGuard {
    last_nonce: HashMap<AircraftId, u64>,
}

impl ReplayGuard {
    /// Empty guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `msg` if its nonce advances the sender's sequence.
    ///
    /// On acceptance the sender's high-water mark moves forward; on
    /// rejection nothing changes.
    pub fn check(&mut self, msg: &SwarmMessage) -> bool {
        match self.last_nonce.get_mut(&msg.sender) {
            Some(last) if msg.nonce <= *last => false,
            Some(last) => {
                *last = msg.nonce;
                true
            }
            None => {
                self.last_nonce.insert(msg.sender, msg.nonce);
                true
            }
        }
    }

    /// Forget a sender's sequence (e.g. after the peer expired).
    pub fn forget(&mut self, sender: AircraftId) {
        self.last_nonce.remove(&sender);
    }

    /// Number of tracked senders.
    pub fn tracked_senders(&self) -> usize {
        self.last_nonce.len()
    }
}
