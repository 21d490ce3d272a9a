//! The result of a cache hit.

use quarry_core::UnixNanos;

/// A cached value together with the generation it was served from.
///
/// Every value in a generation is at most one cache TTL older than the
/// moment the generation is flushed, so `generation_started_at` bounds how
/// stale the value can be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRead<T> {
    value: T,
    generation: u64,
    generation_started_at: UnixNanos,
}

impl<T> CacheRead<T> {
    pub(crate) fn new(value: T, generation: u64, generation_started_at: UnixNanos) -> Self {
        Self {
            value,
            generation,
            generation_started_at,
        }
    }

    /// Consume the wrapper and return the underlying value.
    pub fn into_value(self) -> T {
        self.value
    }

    /// Get a reference to the underlying value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Sequence number of the generation that served this value.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Clock reading taken when the generation's first entry was stored.
    pub fn generation_started_at(&self) -> UnixNanos {
        self.generation_started_at
    }

    /// Nanoseconds between the generation start and `now`, clamped at zero.
    pub fn generation_age(&self, now: UnixNanos) -> i64 {
        now.saturating_sub(self.generation_started_at).max(0)
    }

    /// Map the inner value to a new type.
    pub fn map<U, F>(self, f: F) -> CacheRead<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheRead {
            value: f(self.value),
            generation: self.generation,
            generation_started_at: self.generation_started_at,
        }
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}
