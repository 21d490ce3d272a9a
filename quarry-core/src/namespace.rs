//! Tenant namespaces and the index naming convention.
//!
//! Every record lives in exactly one namespace. The backing index for a
//! namespace is `<namespace><suffix>`; index names without the suffix do not
//! belong to the datastore.

use crate::{QuarryError, QuarryResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest namespace accepted; leaves room for the index suffix within the
/// engine's 255-byte index name limit.
pub const MAX_NAMESPACE_LEN: usize = 200;

/// Legal index-name characters, starting with a letter or digit.
static NAMESPACE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9._-]*$").expect("Invalid namespace regex"));

/// A validated tenant namespace.
///
/// Only lowercase ASCII letters, digits, `.`, `_` and `-` are allowed, and
/// the first character must be a letter or digit. A namespace therefore
/// never contains index-pattern metacharacters, percent escapes or path
/// separators, and never names a relative path such as `..`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Namespace(String);

impl Namespace {
    /// Validate and wrap a namespace string.
    pub fn new(raw: impl Into<String>) -> QuarryResult<Self> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(QuarryError::missing("namespace"));
        }
        if raw.len() > MAX_NAMESPACE_LEN {
            return Err(QuarryError::invalid(
                "namespace",
                format!("longer than {MAX_NAMESPACE_LEN} bytes"),
            ));
        }
        if !NAMESPACE_PATTERN.is_match(&raw) {
            return Err(QuarryError::invalid(
                "namespace",
                format!(
                    "'{raw}' must be lowercase letters, digits, '.', '_' or '-' \
                     starting with a letter or digit"
                ),
            ));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the backing index holding this namespace's records.
    pub fn index_name(&self, suffix: &str) -> String {
        format!("{}{}", self.0, suffix)
    }

    /// Recover the namespace from an index name.
    ///
    /// Returns `None` when the suffix is absent or the remainder is not a
    /// valid namespace.
    pub fn from_index_name(index: &str, suffix: &str) -> Option<Self> {
        let stem = index.strip_suffix(suffix)?;
        Self::new(stem).ok()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Namespace {
    type Error = QuarryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Namespace {
    type Error = QuarryError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Namespace> for String {
    fn from(ns: Namespace) -> Self {
        ns.0
    }
}
