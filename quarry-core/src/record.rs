//! The versioned record stored in the backing engine.
//!
//! A record is written once and never updated. Later writes to the same path
//! produce new records with the same identifier and a later timestamp; the
//! record with the greatest timestamp is the current value of the path.

use crate::{derive_identifier, Identifier, QuarryResult, StorageError, UnixNanos};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Field names of a record as stored in the backing engine.
pub mod fields {
    pub const IDENTIFIER: &str = "id";
    pub const KIND: &str = "kind";
    pub const PATH: &str = "path";
    pub const PAYLOAD: &str = "payload";
    pub const CLASSIFICATION: &str = "doc_type";
    pub const TIMESTAMP: &str = "timestamp";
}

/// One version of the value stored at a virtual path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Derived from `path`; shared by every version of the path.
    #[serde(rename = "id")]
    pub identifier: Identifier,
    /// Caller-defined payload type tag.
    pub kind: String,
    pub path: String,
    /// Opaque serialized content at this version.
    pub payload: String,
    /// Separates datastore records from unrelated documents in the same index.
    #[serde(rename = "doc_type")]
    pub classification: String,
    /// Write time in nanoseconds since the Unix epoch.
    pub timestamp: UnixNanos,
}

impl Record {
    /// Build a record for `path`, deriving its identifier.
    pub fn new(
        classification: impl Into<String>,
        path: impl Into<String>,
        kind: impl Into<String>,
        payload: impl Into<String>,
        timestamp: UnixNanos,
    ) -> Self {
        let path = path.into();
        Self {
            identifier: derive_identifier(&path),
            kind: kind.into(),
            path,
            payload: payload.into(),
            classification: classification.into(),
            timestamp,
        }
    }

    /// Serialize into the document shape written to the backing engine.
    pub fn to_document(&self) -> QuarryResult<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| {
            StorageError::CorruptRecord {
                identifier: self.identifier.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Decode a stored document.
    ///
    /// Fails with `CorruptRecord` when fields are missing or mistyped, or when
    /// the stored identifier does not match the one derived from the path.
    pub fn decode(document: &serde_json::Value) -> QuarryResult<Self> {
        let identifier = document
            .get(fields::IDENTIFIER)
            .and_then(|v| v.as_str())
            .unwrap_or("<unknown>")
            .to_string();

        let record: Record =
            Record::deserialize(document).map_err(|e| StorageError::CorruptRecord {
                identifier: identifier.clone(),
                reason: e.to_string(),
            })?;

        let expected = derive_identifier(&record.path);
        if record.identifier != expected {
            return Err(StorageError::CorruptRecord {
                identifier,
                reason: format!(
                    "identifier does not match path {:?} (expected {})",
                    record.path, expected
                ),
            }
            .into());
        }
        Ok(record)
    }

    /// Decode the payload as JSON.
    pub fn payload_json<T: DeserializeOwned>(&self) -> QuarryResult<T> {
        serde_json::from_str(&self.payload).map_err(|e| {
            StorageError::CorruptRecord {
                identifier: self.identifier.to_string(),
                reason: format!("payload is not valid JSON: {e}"),
            }
            .into()
        })
    }
}
