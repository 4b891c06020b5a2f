//! The signed message envelope.

use serde::{Deserialize, Serialize};
use skymesh_identity::{AircraftId, AuthTag, Identity};

use crate::{Error, Result};

/// What a swarm message carries.
///
/// Discriminants are the wire values inherited from the protocol's first
/// deployment; they must not be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageKind {
    /// Sender's current state vector.
    PositionUpdate = 0x01,
    /// Sender's declared route intent.
    IntentDeclaration = 0x02,
    /// A separation violation observed by the sender.
    ConflictDetected = 0x03,
    /// A maneuver proposed to resolve a conflict.
    ResolutionProposed = 0x04,
    /// A resolution accepted and applied by the sender.
    ResolutionAccepted = 0x05,
    /// Exclusive airspace volume claimed or yielded.
    VolumeAssignment = 0x06,
    /// Sender has declared an emergency.
    EmergencyBroadcast = 0x07,
    /// Liveness beacon, empty payload.
    Heartbeat = 0x08,
    /// A sealed candidate block put to the swarm vote.
    BlockProposal = 0x09,
}

impl MessageKind {
    /// Decode a wire discriminant.
    pub fn from_wire(byte: u8) -> Result<Self> {
        Ok(match byte {
            0x01 => Self::PositionUpdate,
            0x02 => Self::IntentDeclaration,
            0x03 => Self::ConflictDetected,
            0x04 => Self::ResolutionProposed,
            0x05 => Self::ResolutionAccepted,
            0x06 => Self::VolumeAssignment,
            0x07 => Self::EmergencyBroadcast,
            0x08 => Self::Heartbeat,
            0x09 => Self::BlockProposal,
            other => return Err(Error::UnknownKind(other)),
        })
    }
}

/// A signed swarm message; also the ledger's transaction type.
///
/// Immutable once created. The tag covers every other field via
/// [`signing_bytes`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmMessage {
    /// Originating aircraft.
    pub sender: AircraftId,
    /// Destination aircraft, or [`AircraftId::BROADCAST`].
    pub target: AircraftId,
    /// Message kind.
    pub kind: MessageKind,
    /// Kind-specific payload bytes.
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
    /// Creation time, unix milliseconds.
    pub timestamp_ms: u64,
    /// Monotonically increasing per-sender nonce (anti-replay).
    pub nonce: u64,
    /// Signature over all of the above.
    pub tag: AuthTag,
}

impl SwarmMessage {
    /// Build and sign a message with the local identity.
    pub fn signed<I: Identity>(
        identity: &I,
        target: AircraftId,
        kind: MessageKind,
        payload: Vec<u8>,
        timestamp_ms: u64,
        nonce: u64,
    ) -> Self {
        let sender = identity.local_id();
        let bytes = signing_bytes(sender, target, kind, &payload, timestamp_ms, nonce);
        let tag = identity.sign(&bytes);
        Self {
            sender,
            target,
            kind,
            payload,
            timestamp_ms,
            nonce,
            tag,
        }
    }

    /// The canonical bytes this message's tag was computed over.
    pub fn signing_bytes(&self) -> Vec<u8> {
        signing_bytes(
            self.sender,
            self.target,
            self.kind,
            &self.payload,
            self.timestamp_ms,
            self.nonce,
        )
    }

    /// Verify the tag against the sender's registered key.
    pub fn verify<I: Identity>(&self, identity: &I) -> bool {
        identity.verify(&self.signing_bytes(), &self.tag, self.sender)
    }

    /// Whether this message is addressed to the whole swarm.
    pub fn is_broadcast(&self) -> bool {
        self.target.is_broadcast()
    }

    /// Full wire encoding of the message, tag included. Used by the ledger
    /// to digest committed transactions.
    pub fn wire_bytes(&self) -> Vec<u8> {
        let mut bytes = self.signing_bytes();
        bytes.extend_from_slice(&self.tag.0);
        bytes
    }
}

/// Canonical byte layout signed by the sender.
///
/// Fixed-width little-endian fields, payload last. Deterministic across
/// platforms; independent of the envelope serialization.
pub fn signing_bytes(
    sender: AircraftId,
    target: AircraftId,
    kind: MessageKind,
    payload: &[u8],
    timestamp_ms: u64,
    nonce: u64,
) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(25 + payload.len());
    bytes.extend_from_slice(&sender.0.to_le_bytes());
    bytes.extend_from_slice(&target.0.to_le_bytes());
    bytes.push(kind as u8);
    bytes.extend_from_slice(&timestamp_ms.to_le_bytes());
    bytes.extend_from_slice(&nonce.to_le_bytes());
    bytes.extend_from_slice(payload);
    bytes
}
