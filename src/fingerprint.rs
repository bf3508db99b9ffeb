//! Content-derived schema fingerprints
//!
//! A [`Fingerprint`] is the SHA-256 digest of a schema's canonical JSON form.
//! Two schema nodes with the same fingerprint are structurally identical, so
//! the compatibility checker uses (writer, reader) fingerprint pairs as cache
//! keys that stay stable across parses and processes.

use sha2::{Digest, Sha256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// SHA-256 fingerprint of a schema's canonical form
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute a fingerprint from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Compute a fingerprint from a JSON value (canonicalized)
    pub fn from_json(value: &serde_json::Value) -> Self {
        // serde_json renders object keys in sorted order, so the string form
        // of a canonical value is itself canonical
        let canonical = serde_json::to_string(value).unwrap_or_default();
        Self::from_bytes(canonical.as_bytes())
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
