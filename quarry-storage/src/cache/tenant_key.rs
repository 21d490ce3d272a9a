//! Tenant-scoped cache keys for record lookups.
//!
//! The cache itself is keyed by plain strings. Record lookups always go
//! through `TenantScopedKey`, whose constructor requires a namespace and a
//! classification, so a cached record can never be served to another tenant
//! or to a reader expecting a different document classification.

use quarry_core::{Identifier, Namespace};

/// How a record was looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    /// Exact identifier derived from a path.
    Identifier,
    /// Caller-supplied identifier prefix.
    Prefix,
}

impl LookupKind {
    fn tag(self) -> char {
        match self {
            Self::Identifier => 'i',
            Self::Prefix => 'p',
        }
    }

    fn from_tag(tag: char) -> Option<Self> {
        match tag {
            'i' => Some(Self::Identifier),
            'p' => Some(Self::Prefix),
            _ => None,
        }
    }
}

/// A cache key that is scoped to a namespace and classification.
///
/// # Encoding
///
/// `<len(ns)>:<ns><len(cls)>:<cls><tag><key>` where lengths are decimal byte
/// counts and `tag` is `i` (identifier) or `p` (prefix). Length prefixes make
/// the encoding injective whatever characters the parts contain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantScopedKey {
    /// Private inner data - cannot be constructed externally
    inner: TenantKeyInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TenantKeyInner {
    namespace: String,
    classification: String,
    lookup: LookupKind,
    key: String,
}

impl TenantScopedKey {
    /// Key for an exact identifier lookup.
    pub fn identifier(namespace: &Namespace, classification: &str, identifier: &Identifier) -> Self {
        Self::new(namespace, classification, LookupKind::Identifier, identifier.as_str())
    }

    /// Key for an identifier-prefix lookup.
    pub fn prefix(namespace: &Namespace, classification: &str, prefix: &str) -> Self {
        Self::new(namespace, classification, LookupKind::Prefix, prefix)
    }

    fn new(namespace: &Namespace, classification: &str, lookup: LookupKind, key: &str) -> Self {
        Self {
            inner: TenantKeyInner {
                namespace: namespace.as_str().to_string(),
                classification: classification.to_string(),
                lookup,
                key: key.to_string(),
            },
        }
    }

    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    pub fn classification(&self) -> &str {
        &self.inner.classification
    }

    pub fn lookup(&self) -> LookupKind {
        self.inner.lookup
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Encode to the string used as the cache key.
    pub fn encode(&self) -> String {
        let TenantKeyInner {
            namespace,
            classification,
            lookup,
            key,
        } = &self.inner;
        format!(
            "{}:{}{}:{}{}{}",
            namespace.len(),
            namespace,
            classification.len(),
            classification,
            lookup.tag(),
            key
        )
    }

    /// Decode an encoded key. Returns `None` for malformed input.
    pub fn decode(encoded: &str) -> Option<Self> {
        let (namespace, rest) = take_length_prefixed(encoded)?;
        let (classification, rest) = take_length_prefixed(rest)?;
        let mut chars = rest.chars();
        let lookup = LookupKind::from_tag(chars.next()?)?;
        let key = chars.as_str();

        Some(Self {
            inner: TenantKeyInner {
                namespace: Namespace::new(namespace).ok()?.into(),
                classification: classification.to_string(),
                lookup,
                key: key.to_string(),
            },
        })
    }
}

fn take_length_prefixed(input: &str) -> Option<(&str, &str)> {
    let (len, rest) = input.split_once(':')?;
    let len: usize = len.parse().ok()?;
    if rest.len() < len || !rest.is_char_boundary(len) {
        return None;
    }
    Some(rest.split_at(len))
}
