//! Identity types for Quarry records

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Number of digest bytes kept in an identifier (128 bits).
pub const IDENTIFIER_BYTES: usize = 16;

/// Length of an identifier in hex characters.
pub const IDENTIFIER_LEN: usize = IDENTIFIER_BYTES * 2;

/// Record timestamp in nanoseconds since the Unix epoch.
pub type UnixNanos = i64;

/// Deterministic, path-derived record identifier.
///
/// All versions of the same path share one identifier; versions are told
/// apart only by their timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Wrap an already-derived identifier string (e.g. read back from storage).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this identifier starts with `prefix`.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the identifier for a virtual path.
///
/// SHA-256 of the UTF-8 path, truncated to 128 bits and hex-encoded.
/// Any input, including the empty string, yields a 32-character identifier.
pub fn derive_identifier(path: &str) -> Identifier {
    let digest = Sha256::digest(path.as_bytes());
    Identifier(hex::encode(&digest[..IDENTIFIER_BYTES]))
}
