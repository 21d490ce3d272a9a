//! Wall-clock sources for record timestamps.

use crate::UnixNanos;
use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of nanosecond timestamps.
pub trait Clock: Send + Sync {
    /// Current time in nanoseconds since the Unix epoch.
    fn now_nanos(&self) -> UnixNanos;
}

/// Clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_nanos(&self) -> UnixNanos {
        let now = Utc::now();
        // Out of i64 range only after the year 2262.
        now.timestamp_nanos_opt()
            .unwrap_or_else(|| now.timestamp().saturating_mul(1_000_000_000))
    }
}

/// Manually driven clock for deterministic tests.
///
/// With a non-zero `tick`, every read advances the clock by `tick`
/// nanoseconds after returning, so consecutive reads are strictly increasing.
#[derive(Debug, Default)]
pub struct MockClock {
    now: AtomicI64,
    tick: i64,
}

impl MockClock {
    /// A frozen clock reading `start`.
    pub fn new(start: UnixNanos) -> Self {
        Self {
            now: AtomicI64::new(start),
            tick: 0,
        }
    }

    /// A clock reading `start`, advancing by `tick` after each read.
    pub fn ticking(start: UnixNanos, tick: i64) -> Self {
        Self {
            now: AtomicI64::new(start),
            tick,
        }
    }

    pub fn set(&self, nanos: UnixNanos) {
        self.now.store(nanos, Ordering::SeqCst);
    }

    pub fn advance(&self, nanos: i64) {
        self.now.fetch_add(nanos, Ordering::SeqCst);
    }

    /// Current reading without advancing.
    pub fn peek(&self) -> UnixNanos {
        self.now.load(Ordering::SeqCst)
    }
}

impl Clock for MockClock {
    fn now_nanos(&self) -> UnixNanos {
        self.now.fetch_add(self.tick, Ordering::SeqCst)
    }
}
