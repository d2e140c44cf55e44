//! Common types used across Courier modules.

use serde::{Deserialize, Serialize};

/// A 256-bit hash value (SHA3-256).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// Create a new Hash256 from bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the bytes of the hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Timestamp wrapper for consistent serialization.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Get current UTC timestamp.
pub fn now() -> Timestamp {
    chrono::Utc::now()
}

/// Arbitrary metadata stored for a peer (at minimum `their_endpoint`).
pub type PeerMetadata = serde_json::Map<String, serde_json::Value>;

/// Metadata key holding a peer's reachable endpoint.
pub const THEIR_ENDPOINT: &str = "their_endpoint";

/// Read the endpoint out of peer metadata, if one is stored.
pub fn their_endpoint(metadata: &PeerMetadata) -> Option<&str> {
    metadata.get(THEIR_ENDPOINT).and_then(|v| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash256_display() {
        let hash = Hash256::new([0u8; 32]);
        let display = format!("{}", hash);
        assert_eq!(display.len(), 64); // 32 bytes * 2 hex chars
    }

    #[test]
    fn test_their_endpoint() {
        let mut meta = PeerMetadata::new();
        assert!(their_endpoint(&meta).is_none());

        meta.insert(THEIR_ENDPOINT.into(), serde_json::json!("mem://bob"));
        assert_eq!(their_endpoint(&meta), Some("mem://bob"));
    }

    #[test]
    fn test_non_string_endpoint_ignored() {
        let mut meta = PeerMetadata::new();
        meta.insert(THEIR_ENDPOINT.into(), serde_json::json!(42));
        assert!(their_endpoint(&meta).is_none());
    }
}
