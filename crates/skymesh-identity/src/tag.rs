//! Authentication tag carried on every swarm message.

use serde::{Deserialize, Serialize};

/// A 64-byte Ed25519 signature over a message's canonical bytes.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTag(#[serde(with = "serde_bytes")] pub [u8; 64]);

impl AuthTag {
    /// An all-zero tag. Never verifies against a real key; useful as a
    /// placeholder while a message is being constructed.
    pub const ZERO: Self = Self([0u8; 64]);
}

impl std::fmt::Debug for AuthTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuthTag({}...)", &hex::encode(&self.0[..4]))
    }
}

impl Default for AuthTag {
    fn default() -> Self {
        Self::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_tag_debug_is_short() {
        let s = format!("{:?}", AuthTag::ZERO);
        assert_eq!(s, "AuthTag(00000000...)");
    }
}
