//! # Core Value Types
//!
//! Byte-level identities and ordering keys of the slashing-protection model.
//!
//! ## Clusters
//!
//! - **Ordering keys**: `Slot`, `Epoch`
//! - **Roots**: `Bytes32`, `SigningRoot`, `GenesisValidatorsRoot`
//! - **Identity**: `PublicKey`

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::TypeError;

// =============================================================================
// ORDERING KEYS
// =============================================================================

/// Consensus slot; orders block proposals.
pub type Slot = u64;

/// Consensus epoch; orders attestation checkpoints.
pub type Epoch = u64;

// =============================================================================
// ROOTS
// =============================================================================

/// A fixed 32-byte value (hash or root).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Bytes32(pub [u8; 32]);

/// Hash committing to the content being signed.
pub type SigningRoot = Bytes32;

/// Root identifying the network a validator set belongs to.
pub type GenesisValidatorsRoot = Bytes32;

impl Bytes32 {
    /// All-zero value.
    pub const ZERO: Bytes32 = Bytes32([0u8; 32]);

    /// Build from a byte slice that must be exactly 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        let array: [u8; 32] = bytes.try_into().map_err(|_| TypeError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        })?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Bytes32 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl FromStr for Bytes32 {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_slice(&decode_prefixed_hex(s)?)
    }
}

impl fmt::Display for Bytes32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Bytes32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bytes32({self})")
    }
}

impl Serialize for Bytes32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Bytes32 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

// =============================================================================
// IDENTITY
// =============================================================================

/// A validator public key.
///
/// Length is not fixed by this crate (BLS keys are 48 bytes); the only
/// structural requirement is that the key is non-empty.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self, TypeError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(TypeError::EmptyPublicKey);
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for PublicKey {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(decode_prefixed_hex(s)?)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({self})")
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// Decode hex with an optional `0x` prefix.
fn decode_prefixed_hex(s: &str) -> Result<Vec<u8>, TypeError> {
    let trimmed = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(trimmed).map_err(|e| TypeError::InvalidHex(format!("{s}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes32_parses_with_and_without_prefix() {
        let hex = "04".repeat(32);
        let with_prefix: Bytes32 = format!("0x{hex}").parse().unwrap();
        let without_prefix: Bytes32 = hex.parse().unwrap();
        assert_eq!(with_prefix, without_prefix);
        assert_eq!(with_prefix, Bytes32([4u8; 32]));
    }

    #[test]
    fn test_bytes32_rejects_wrong_length() {
        let err = "0x0102".parse::<Bytes32>().unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
    }

    #[test]
    fn test_bytes32_rejects_bad_hex() {
        assert!(matches!(
            "0xzz".parse::<Bytes32>(),
            Err(TypeError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_public_key_rejects_empty() {
        assert_eq!("0x".parse::<PublicKey>(), Err(TypeError::EmptyPublicKey));
    }

    #[test]
    fn test_display_is_lowercase_prefixed() {
        let key = PublicKey::from_bytes(vec![0xAB, 0xCD]).unwrap();
        assert_eq!(key.to_string(), "0xabcd");
    }

    #[test]
    fn test_serde_uses_hex_strings() {
        let root = Bytes32([0x11; 32]);
        let json = serde_json::to_string(&root).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "11".repeat(32)));
        let back: Bytes32 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, root);
    }
}
