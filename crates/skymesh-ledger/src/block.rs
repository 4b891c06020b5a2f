//! Block structure and transaction digests.

use serde::{Deserialize, Serialize};
use skymesh_identity::AircraftId;
use skymesh_protocol::SwarmMessage;

/// A 256-bit blake3 digest over a block's ordered transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TxDigest(pub [u8; 32]);

impl TxDigest {
    /// The zero digest, used as the genesis block's previous hash.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Hex string of the digest.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Number of leading zero bits, for the proof-of-work predicate.
    pub fn leading_zero_bits(&self) -> u32 {
        let mut zeros = 0u32;
        for byte in self.0 {
            if byte == 0 {
                zeros += 8;
            } else {
                zeros += byte.leading_zeros();
                break;
            }
        }
        zeros
    }
}

impl std::fmt::Display for TxDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}...", &self.to_hex()[..8])
    }
}

/// Order-sensitive digest over a transaction list.
///
/// Each transaction contributes its full wire bytes (canonical fields plus
/// tag) behind a length prefix, so neither reordering, mutating, inserting
/// nor splicing transactions across boundaries preserves the digest.
pub fn digest_transactions(transactions: &[SwarmMessage]) -> TxDigest {
    let mut hasher = blake3::Hasher::new();
    for tx in transactions {
        let bytes = tx.wire_bytes();
        hasher.update(&(bytes.len() as u64).to_le_bytes());
        hasher.update(&bytes);
    }
    TxDigest(*hasher.finalize().as_bytes())
}

/// One block of the swarm ledger.
///
/// Terminal (immutable) once accepted into the canonical chain; before that
/// it is a candidate and may be discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Strictly increasing block id; 0 is genesis.
    pub id: u64,
    /// Digest of the previous block's transactions.
    pub previous_hash: TxDigest,
    /// Digest of this block's transactions.
    pub digest: TxDigest,
    /// Ordered transactions.
    pub transactions: Vec<SwarmMessage>,
    /// Creation time, unix milliseconds.
    pub timestamp_ms: u64,
    /// Node that sealed and proposed this block.
    pub proposer: AircraftId,
    /// Proof-of-work token satisfying the difficulty predicate.
    pub proof: u64,
}

impl Block {
    /// The deterministic genesis block: id 0, zero previous hash, no
    /// transactions, no proof.
    pub fn genesis() -> Self {
        Self {
            id: 0,
            previous_hash: TxDigest::ZERO,
            digest: digest_transactions(&[]),
            transactions: Vec::new(),
            timestamp_ms: 0,
            proposer: AircraftId::BROADCAST,
            proof: 0,
        }
    }

    /// Header bytes hashed by the proof-of-work predicate.
    pub fn proof_bytes(&self, proof: u64) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.id.to_le_bytes());
        hasher.update(&self.previous_hash.0);
        hasher.update(&self.digest.0);
        hasher.update(&self.proposer.0.to_le_bytes());
        hasher.update(&proof.to_le_bytes());
        *hasher.finalize().as_bytes()
    }

    /// Whether two candidates are structurally identical for quorum
    /// purposes: same id and same transaction digest.
    pub fn structurally_identical(&self, other: &Self) -> bool {
        self.id == other.id && self.digest == other.digest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skymesh_identity::{AuthTag, AircraftId};
    use skymesh_protocol::MessageKind;

    fn tx(sender: u32, nonce: u64, payload: &[u8]) -> SwarmMessage {
        SwarmMessage {
            sender: AircraftId(sender),
            target: AircraftId::BROADCAST,
            kind: MessageKind::PositionUpdate,
            payload: payload.to_vec(),
            timestamp_ms: 0,
            nonce,
            tag: AuthTag::ZERO,
        }
    }

    #[test]
    fn genesis_is_deterministic() {
        let a = Block::genesis();
        let b = Block::genesis();
        assert_eq!(a, b);
        assert_eq!(a.id, 0);
        assert_eq!(a.previous_hash, TxDigest::ZERO);
        assert!(a.transactions.is_empty());
    }

    #[test]
    fn digest_is_order_sensitive() {
        let t1 = tx(1, 1, b"a");
        let t2 = tx(2, 1, b"b");
        let forward = digest_transactions(&[t1.clone(), t2.clone()]);
        let reversed = digest_transactions(&[t2, t1]);
        assert_ne!(forward, reversed);
    }

    #[test]
    fn digest_changes_with_any_transaction() {
        let t1 = tx(1, 1, b"a");
        let original = digest_transactions(&[t1.clone()]);

        let mut tampered = t1;
        tampered.payload = b"A".to_vec();
        assert_ne!(digest_transactions(&[tampered]), original);
    }

    #[test]
    fn length_prefix_prevents_boundary_splicing() {
        let short = tx(1, 1, b"ab");
        let long = tx(1, 1, b"abc");
        let a = digest_transactions(&[short]);
        let b = digest_transactions(&[long]);
        assert_ne!(a, b);
    }

    #[test]
    fn leading_zero_bits() {
        assert_eq!(TxDigest::ZERO.leading_zero_bits(), 256);

        let mut one_high = [0u8; 32];
        one_high[0] = 0x80;
        assert_eq!(TxDigest(one_high).leading_zero_bits(), 0);

        let mut low_first_byte = [0u8; 32];
        low_first_byte[0] = 0x01;
        assert_eq!(TxDigest(low_first_byte).leading_zero_bits(), 7);
    }

    #[test]
    fn structural_identity_ignores_proposer_and_proof() {
        let t = tx(1, 1, b"x");
        let digest = digest_transactions(std::slice::from_ref(&t));
        let mut a = Block {
            id: 1,
            previous_hash: TxDigest::ZERO,
            digest,
            transactions: vec![t],
            timestamp_ms: 10,
            proposer: AircraftId(1),
            proof: 42,
        };
        let mut b = a.clone();
        b.proposer = AircraftId(2);
        b.proof = 99;
        b.timestamp_ms = 11;
        assert!(a.structurally_identical(&b));

        a.id = 2;
        assert!(!a.structurally_identical(&b));
    }
}
