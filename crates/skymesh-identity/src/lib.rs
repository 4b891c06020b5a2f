//! Aircraft identity and message authentication.
//!
//! Every aircraft in the swarm holds an Ed25519 key pair. Outbound messages
//! are signed over their canonical bytes; inbound messages are verified
//! against the sender's registered verifying key **before** any other
//! processing. A message that fails verification is dropped, never applied.
//!
//! The [`Identity`] trait is the seam between the coordination core and
//! whatever key management a deployment uses. [`KeyStore`] is the in-memory
//! implementation: one local signing key plus a registry of peer verifying
//! keys learned out of band (e.g. at swarm formation).

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

mod tag;

pub use tag::AuthTag;

/// Unique aircraft identifier within a swarm.
///
/// Id 0 is reserved as the broadcast address and never identifies a real
/// aircraft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AircraftId(pub u32);

impl AircraftId {
    /// The broadcast address (target of messages addressed to the whole swarm).
    pub const BROADCAST: Self = Self(0);

    /// Whether this id is the broadcast address.
    pub const fn is_broadcast(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for AircraftId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AC-{:04}", self.0)
    }
}

/// Result type for identity operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from identity operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The broadcast id cannot hold keys.
    #[error("aircraft id 0 is reserved for broadcast")]
    ReservedId,

    /// No verifying key registered for the given aircraft.
    #[error("no verifying key registered for {0}")]
    UnknownAircraft(AircraftId),
}

/// Signing and verification seam used by the swarm node.
///
/// `verify` returns plain `bool`: an unverifiable message is a protocol
/// error handled by dropping and counting, never by propagating a failure.
pub trait Identity {
    /// The local aircraft's id.
    fn local_id(&self) -> AircraftId;

    /// Sign canonical message bytes with the local key.
    fn sign(&self, bytes: &[u8]) -> AuthTag;

    /// Verify a tag over canonical bytes against `sender`'s registered key.
    fn verify(&self, bytes: &[u8], tag: &AuthTag, sender: AircraftId) -> bool;
}

/// In-memory key store: local signing key + peer verifying keys.
pub struct KeyStore {
    local_id: AircraftId,
    signing: SigningKey,
    peers: HashMap<AircraftId, VerifyingKey>,
}

impl KeyStore {
    /// Generate a fresh key pair for `local_id`.
    ///
    /// The local verifying key is self-registered so a node can verify its
    /// own broadcasts when they loop back.
    pub fn generate(local_id: AircraftId) -> Result<Self> {
        if local_id.is_broadcast() {
            return Err(Error::ReservedId);
        }
        let signing = SigningKey::generate(&mut rand::rngs::OsRng);
        let mut peers = HashMap::new();
        peers.insert(local_id, signing.verifying_key());
        Ok(Self {
            local_id,
            signing,
            peers,
        })
    }

    /// The local verifying key, for sharing with peers.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    /// Register (or replace) a peer's verifying key.
    pub fn register_peer(&mut self, id: AircraftId, key: VerifyingKey) -> Result<()> {
        if id.is_broadcast() {
            return Err(Error::ReservedId);
        }
        self.peers.insert(id, key);
        Ok(())
    }

    /// Forget a peer's key.
    pub fn remove_peer(&mut self, id: AircraftId) {
        self.peers.remove(&id);
    }

    /// Number of registered keys (including our own).
    pub fn known_keys(&self) -> usize {
        self.peers.len()
    }
}

impl Identity for KeyStore {
    fn local_id(&self) -> AircraftId {
        self.local_id
    }

    fn sign(&self, bytes: &[u8]) -> AuthTag {
        AuthTag(self.signing.sign(bytes).to_bytes())
    }

    fn verify(&self, bytes: &[u8], tag: &AuthTag, sender: AircraftId) -> bool {
        let Some(key) = self.peers.get(&sender) else {
            return false;
        };
        let sig = Signature::from_bytes(&tag.0);
        key.verify(bytes, &sig).is_ok()
    }
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("local_id", &self.local_id)
            .field("known_keys", &self.peers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_roundtrip() {
        let store = KeyStore::generate(AircraftId(7)).unwrap();
        let tag = store.sign(b"position report");
        assert!(store.verify(b"position report", &tag, AircraftId(7)));
    }

    #[test]
    fn tampered_bytes_fail_verification() {
        let store = KeyStore::generate(AircraftId(7)).unwrap();
        let tag = store.sign(b"position report");
        assert!(!store.verify(b"position REPORT", &tag, AircraftId(7)));
    }

    #[test]
    fn unknown_sender_fails_verification() {
        let store = KeyStore::generate(AircraftId(7)).unwrap();
        let tag = store.sign(b"hello");
        assert!(!store.verify(b"hello", &tag, AircraftId(99)));
    }

    #[test]
    fn forged_tag_from_wrong_key_fails() {
        let alice = KeyStore::generate(AircraftId(1)).unwrap();
        let mut bob = KeyStore::generate(AircraftId(2)).unwrap();
        bob.register_peer(AircraftId(1), alice.verifying_key())
            .unwrap();

        // Bob signs with his own key but claims to be Alice.
        let forged = bob.sign(b"spoofed");
        assert!(!bob.verify(b"spoofed", &forged, AircraftId(1)));

        // The genuine tag verifies.
        let genuine = alice.sign(b"spoofed");
        assert!(bob.verify(b"spoofed", &genuine, AircraftId(1)));
    }

    #[test]
    fn broadcast_id_is_rejected() {
        assert!(matches!(
            KeyStore::generate(AircraftId::BROADCAST),
            Err(Error::ReservedId)
        ));
    }

    #[test]
    fn aircraft_id_display() {
        assert_eq!(format!("{}", AircraftId(42)), "AC-0042");
        assert!(AircraftId::BROADCAST.is_broadcast());
        assert!(!AircraftId(1).is_broadcast());
    }
}
