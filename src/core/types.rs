//! Common types used across governor modules.

use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

/// A 256-bit hash value (SHA3-256).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// Create a new Hash256 from bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create a zero hash.
    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Hash a sequence of byte slices as one message.
    pub fn digest(parts: &[&[u8]]) -> Self {
        let mut hasher = Sha3_256::new();
        for part in parts {
            hasher.update(part);
        }
        let out = hasher.finalize();
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&out);
        Self(arr)
    }

    /// Get the bytes of the hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Default for Hash256 {
    fn default() -> Self {
        Self::zero()
    }
}

/// Timestamp wrapper for consistent serialization.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Get current UTC timestamp.
pub fn now() -> Timestamp {
    chrono::Utc::now()
}

/// A named policy concern used to bias member scoring.
///
/// Serialized as its lowercase name so it can key maps in TOML and JSON.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Axiom {
    /// Preserve history and recorded memory
    Preservation,
    /// Favor speed and resource economy
    Efficiency,
    /// Keep processes observable
    Transparency,
    /// Avoid harm and irreversible outcomes
    Safety,
    /// Respect consent of affected parties
    Autonomy,
    /// Deployment-specific concern
    Custom(String),
}

impl std::fmt::Display for Axiom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axiom::Preservation => write!(f, "preservation"),
            Axiom::Efficiency => write!(f, "efficiency"),
            Axiom::Transparency => write!(f, "transparency"),
            Axiom::Safety => write!(f, "safety"),
            Axiom::Autonomy => write!(f, "autonomy"),
            Axiom::Custom(name) => write!(f, "{}", name),
        }
    }
}

impl From<String> for Axiom {
    fn from(name: String) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "preservation" => Axiom::Preservation,
            "efficiency" => Axiom::Efficiency,
            "transparency" => Axiom::Transparency,
            "safety" => Axiom::Safety,
            "autonomy" => Axiom::Autonomy,
            _ => Axiom::Custom(name),
        }
    }
}

impl From<Axiom> for String {
    fn from(axiom: Axiom) -> Self {
        axiom.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash256_zero() {
        let hash = Hash256::zero();
        assert_eq!(hash.0, [0u8; 32]);
    }

    #[test]
    fn test_hash256_hex_roundtrip() {
        let hash = Hash256::digest(&[b"ledger", b"entry"]);
        let parsed = Hash256::from_hex(&hash.to_hex()).unwrap();
        assert_eq!(hash, parsed);
    }

    #[test]
    fn test_digest_is_order_sensitive() {
        let a = Hash256::digest(&[b"a", b"b"]);
        let b = Hash256::digest(&[b"b", b"a"]);
        assert_ne!(a, b);
        assert_eq!(a, Hash256::digest(&[b"ab"]));
    }

    #[test]
    fn test_axiom_display() {
        assert_eq!(Axiom::Preservation.to_string(), "preservation");
        assert_eq!(Axiom::Custom("equity".into()).to_string(), "equity");
    }

    #[test]
    fn test_axiom_serializes_as_name() {
        let json = serde_json::to_string(&Axiom::Efficiency).unwrap();
        assert_eq!(json, "\"efficiency\"");
        let parsed: Axiom = serde_json::from_str("\"Safety\"").unwrap();
        assert_eq!(parsed, Axiom::Safety);
        let custom: Axiom = serde_json::from_str("\"equity\"").unwrap();
        assert_eq!(custom, Axiom::Custom("equity".to_string()));
    }
}
