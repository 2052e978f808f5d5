//! Content fingerprints for change detection.
//!
//! A fingerprint is the full SHA-256 of the text, hex encoded. It only answers
//! "did the canonical content change since it was last persisted"; nothing
//! relies on it as a security property.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest of a piece of text
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Get the raw hex string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fingerprint a piece of text
pub fn fingerprint(text: &str) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    Fingerprint(hex::encode(hasher.finalize()))
}
