//! Boolean filter expressions over stored documents.
//!
//! Filters are data, not query strings: each backend translates the tree into
//! its own query language, so caller-supplied values are never spliced into
//! query text.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Filter expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterExpr {
    /// Field equals value exactly.
    Term { field: String, value: Value },
    /// String field starts with the given prefix.
    Prefix { field: String, value: String },
    /// All sub-filters match. An empty list matches everything.
    And(Vec<FilterExpr>),
    /// Any sub-filter matches. An empty list matches nothing.
    Or(Vec<FilterExpr>),
    /// Sub-filter does not match.
    Not(Box<FilterExpr>),
}

impl FilterExpr {
    /// Create an equality filter.
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create a prefix filter.
    pub fn prefix(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Prefix {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn and(filters: impl IntoIterator<Item = FilterExpr>) -> Self {
        Self::And(filters.into_iter().collect())
    }

    pub fn or(filters: impl IntoIterator<Item = FilterExpr>) -> Self {
        Self::Or(filters.into_iter().collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(filter: FilterExpr) -> Self {
        Self::Not(Box::new(filter))
    }

    /// A filter that matches every document.
    pub fn match_all() -> Self {
        Self::And(Vec::new())
    }

    /// Evaluate this filter against a stored document.
    ///
    /// Missing fields never match `Term` or `Prefix`.
    pub fn matches(&self, document: &Value) -> bool {
        match self {
            Self::Term { field, value } => document.get(field) == Some(value),
            Self::Prefix { field, value } => document
                .get(field)
                .and_then(Value::as_str)
                .is_some_and(|s| s.starts_with(value.as_str())),
            Self::And(filters) => filters.iter().all(|f| f.matches(document)),
            Self::Or(filters) => filters.iter().any(|f| f.matches(document)),
            Self::Not(filter) => !filter.matches(document),
        }
    }
}
