//! Process-local cache flushed wholesale once per generation.
//!
//! The cache is either `Empty` or `Populated`. The first `set` into an empty
//! cache opens a generation: it stamps the generation start and schedules a
//! single flush `ttl` later. Later `set` calls join the open generation
//! without extending it. When the flush fires every entry is dropped at once
//! and the next `set` opens a new generation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use quarry_core::{Clock, UnixNanos, MAX_CACHE_TTL};
use tokio::time::Instant;

use super::CacheRead;

/// Counters describing cache activity since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Generations opened so far.
    pub generations: u64,
    /// Generations dropped, by timer, lazy expiry or `clear`.
    pub flushes: u64,
    /// Entries in the open generation.
    pub entry_count: usize,
}

impl CacheStats {
    /// Fraction of lookups served from the cache, or 0.0 with no lookups.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

enum CacheState<V> {
    Empty,
    Populated {
        generation: u64,
        started_at: UnixNanos,
        expires_at: Instant,
        entries: HashMap<String, V>,
    },
}

struct Inner<V> {
    state: CacheState<V>,
    stats: CacheStats,
    /// Bumped by every flush and every `clear`, even of an empty cache.
    epoch: u64,
}

impl<V> Inner<V> {
    fn flush(&mut self) {
        if let CacheState::Populated { generation, .. } = &self.state {
            tracing::debug!(generation = *generation, "flushing cache generation");
            self.state = CacheState::Empty;
            self.stats.flushes += 1;
            self.epoch += 1;
        }
    }

    /// Flush only if `generation` is still the open one.
    fn flush_generation(&mut self, target: u64) {
        if matches!(&self.state, CacheState::Populated { generation, .. } if *generation == target)
        {
            self.flush();
        }
    }

    /// Drop the open generation if its window has already elapsed.
    fn expire(&mut self, now: Instant) {
        if matches!(&self.state, CacheState::Populated { expires_at, .. } if now >= *expires_at) {
            self.flush();
        }
    }
}

/// Key/value cache with a fixed generation lifetime.
///
/// All state sits behind one mutex that is held only for in-memory work.
/// The scheduled flush takes the same lock, so a flush and a concurrent
/// `set` are serialized. The flush task holds a `Weak` reference and the
/// generation number it was scheduled for; it does nothing if the cache was
/// dropped or that generation already ended.
///
/// Outside a tokio runtime no task can be scheduled and expiry is checked on
/// the next `get` or `set` instead. Inside a runtime the same check also
/// runs, so a read right at the window boundary never sees the old
/// generation even if the timer task has not been polled yet.
pub struct GenerationCache<V> {
    inner: Arc<Mutex<Inner<V>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V> std::fmt::Debug for GenerationCache<V>
where
    V: Clone + Send + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationCache")
            .field("ttl", &self.ttl)
            .field("stats", &self.stats())
            .finish()
    }
}

impl<V> GenerationCache<V>
where
    V: Clone + Send + 'static,
{
    /// Create an empty cache whose generations last `ttl`, capped at
    /// [`MAX_CACHE_TTL`].
    ///
    /// `clock` only stamps `generation_started_at`; expiry is driven by the
    /// tokio clock so that paused-time tests control it.
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let ttl = ttl.min(MAX_CACHE_TTL);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: CacheState::Empty,
                stats: CacheStats::default(),
                epoch: 0,
            })),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Look up `key` in the open generation.
    ///
    /// Returns `None` when the cache is empty or the key is absent.
    pub fn get(&self, key: &str) -> Option<CacheRead<V>> {
        let mut inner = self.lock();
        inner.expire(Instant::now());

        let found = match &inner.state {
            CacheState::Empty => None,
            CacheState::Populated {
                generation,
                started_at,
                entries,
                ..
            } => entries
                .get(key)
                .map(|value| CacheRead::new(value.clone(), *generation, *started_at)),
        };

        if found.is_some() {
            inner.stats.hits += 1;
        } else {
            inner.stats.misses += 1;
        }
        found
    }

    /// Store `value` under `key`, opening a new generation if the cache is empty.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.insert(key.into(), value, None);
    }

    /// Counter advanced by every flush or `clear`.
    ///
    /// Read this before fetching a value and pass it to
    /// [`GenerationCache::set_unless_flushed`] so that a value fetched before
    /// a flush is not stored after it.
    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    /// Store `value` only if the cache was not flushed or cleared since
    /// `epoch` was read.
    ///
    /// Returns whether the value was stored.
    pub fn set_unless_flushed(&self, key: impl Into<String>, value: V, epoch: u64) -> bool {
        self.insert(key.into(), value, Some(epoch))
    }

    fn insert(&self, key: String, value: V, epoch: Option<u64>) -> bool {
        let now = Instant::now();
        let mut inner = self.lock();
        if epoch.is_some_and(|epoch| epoch != inner.epoch) {
            tracing::debug!(key = %key, "cache flushed during fetch; not storing");
            return false;
        }
        inner.expire(now);

        let opened = match &mut inner.state {
            CacheState::Populated { entries, .. } => {
                entries.insert(key, value);
                None
            }
            CacheState::Empty => {
                inner.stats.generations += 1;
                let generation = inner.stats.generations;
                let started_at = self.clock.now_nanos();
                let mut entries = HashMap::new();
                entries.insert(key, value);
                inner.state = CacheState::Populated {
                    generation,
                    started_at,
                    expires_at: now + self.ttl,
                    entries,
                };
                Some((generation, started_at))
            }
        };
        drop(inner);

        if let Some((generation, started_at)) = opened {
            tracing::debug!(
                generation,
                started_at,
                ttl_secs = self.ttl.as_secs(),
                "opened cache generation"
            );
            self.schedule_flush(generation);
        }
        true
    }

    fn schedule_flush(&self, generation: u64) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::trace!(generation, "no runtime; cache generation expires lazily");
            return;
        };
        let weak: Weak<Mutex<Inner<V>>> = Arc::downgrade(&self.inner);
        let ttl = self.ttl;
        handle.spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(inner) = weak.upgrade() {
                inner
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .flush_generation(generation);
            }
        });
    }

    /// Drop every entry now, ending the open generation.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.epoch += 1;
        inner.flush();
    }

    /// Number of entries in the open generation.
    pub fn len(&self) -> usize {
        let mut inner = self.lock();
        inner.expire(Instant::now());
        match &inner.state {
            CacheState::Empty => 0,
            CacheState::Populated { entries, .. } => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start stamp of the open generation, if any.
    pub fn generation_started_at(&self) -> Option<UnixNanos> {
        let mut inner = self.lock();
        inner.expire(Instant::now());
        match &inner.state {
            CacheState::Empty => None,
            CacheState::Populated { started_at, .. } => Some(*started_at),
        }
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        let entry_count = match &inner.state {
            CacheState::Empty => 0,
            CacheState::Populated { entries, .. } => entries.len(),
        };
        CacheStats {
            entry_count,
            ..inner.stats
        }
    }
}
