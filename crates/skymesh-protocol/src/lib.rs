//! Swarm message envelope and payload codec.
//!
//! A [`SwarmMessage`] is both the unit of peer communication and the
//! transaction recorded in the ledger. Every message carries sender id,
//! target id (0 = broadcast), kind, payload bytes, timestamp, a
//! monotonically increasing per-sender nonce, and an authentication tag
//! computed over all of the other fields.
//!
//! The envelope is immutable once signed: any change to a signed field
//! invalidates the tag, and the ledger digests messages including their
//! tags, so a committed transaction cannot be altered without breaking the
//! chain.

mod message;
mod replay;

pub use message::{signing_bytes, MessageKind, SwarmMessage};
pub use replay::ReplayGuard;

use serde::{de::DeserializeOwned, Serialize};

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from envelope and payload handling.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Payload bytes did not decode as the expected type.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Unknown message kind discriminant on the wire.
    #[error("unknown message kind {0:#04x}")]
    UnknownKind(u8),
}

/// Encode a typed payload into envelope bytes.
pub fn encode_payload<T: Serialize>(value: &T) -> Vec<u8> {
    // bincode of a serde struct cannot fail for the payload types we carry
    bincode::serialize(value).unwrap_or_default()
}

/// Decode envelope bytes back into a typed payload.
pub fn decode_payload<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| Error::MalformedPayload(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use skymesh_geo::AircraftPosition;
    use skymesh_identity::AircraftId;

    #[test]
    fn position_payload_roundtrip() {
        let pos = AircraftPosition::at(AircraftId(3), 47.5, 8.5, 4200.0);
        let bytes = encode_payload(&pos);
        let back: AircraftPosition = decode_payload(&bytes).unwrap();
        assert_eq!(back, pos);
    }

    #[test]
    fn garbage_payload_is_malformed() {
        let r: Result<AircraftPosition> = decode_payload(&[0xff, 0x01]);
        assert!(matches!(r, Err(Error::MalformedPayload(_))));
    }
}
