//! Typed search requests: filter, sort, and limit.

use crate::record::fields;
use crate::{FilterExpr, UnixNanos};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    pub order: SortOrder,
}

impl SortField {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Desc,
        }
    }

    /// Compare two documents on this key.
    ///
    /// Documents missing the field sort after those that have it, in either
    /// direction. Numbers compare numerically, strings lexically.
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        let ordering = match (a.get(&self.field), b.get(&self.field)) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Greater,
            (Some(_), None) => return Ordering::Less,
            (Some(x), Some(y)) => compare_values(x, y),
        };
        match self.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

/// A search request against one index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub filter: FilterExpr,
    pub sort: Vec<SortField>,
    /// Maximum number of documents returned.
    pub limit: usize,
}

impl SearchQuery {
    /// Match-all query with no sort and a limit of ten.
    pub fn new() -> Self {
        Self {
            filter: FilterExpr::match_all(),
            sort: Vec::new(),
            limit: 10,
        }
    }

    pub fn with_filter(mut self, filter: FilterExpr) -> Self {
        self.filter = filter;
        self
    }

    pub fn sort_by(mut self, sort: SortField) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Newest version of the record with exactly this identifier.
    pub fn latest_by_identifier(identifier: &str, classification: &str) -> Self {
        Self::versions(FilterExpr::term(fields::IDENTIFIER, identifier), classification)
            .with_limit(1)
    }

    /// Newest version among records whose identifier starts with `prefix`.
    pub fn latest_by_identifier_prefix(prefix: &str, classification: &str) -> Self {
        Self::versions(FilterExpr::prefix(fields::IDENTIFIER, prefix), classification)
            .with_limit(1)
    }

    /// Up to `limit` versions of one identifier, newest first.
    pub fn versions_of(identifier: &str, classification: &str, limit: usize) -> Self {
        Self::versions(FilterExpr::term(fields::IDENTIFIER, identifier), classification)
            .with_limit(limit)
    }

    /// The version of one identifier written at exactly `timestamp`.
    pub fn exact_version(identifier: &str, classification: &str, timestamp: UnixNanos) -> Self {
        Self::new()
            .with_filter(FilterExpr::and([
                FilterExpr::term(fields::IDENTIFIER, identifier),
                FilterExpr::term(fields::CLASSIFICATION, classification),
                FilterExpr::term(fields::TIMESTAMP, timestamp),
            ]))
            .with_limit(1)
    }

    fn versions(id_filter: FilterExpr, classification: &str) -> Self {
        Self::new()
            .with_filter(FilterExpr::and([
                id_filter,
                FilterExpr::term(fields::CLASSIFICATION, classification),
            ]))
            .sort_by(SortField::desc(fields::TIMESTAMP))
    }

    /// Compare two documents under this query's sort keys.
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        self.sort
            .iter()
            .map(|s| s.compare(a, b))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self::new()
    }
}
