use std::sync::atomic::{AtomicU64, Ordering};

use time::OffsetDateTime;

/// Millisecond wall-clock source. Injected everywhere a timestamp is taken
/// so tests can pin time exactly.
pub trait Clock: Send + Sync {
    /// Current time as unix-epoch milliseconds.
    fn now_ms(&self) -> u64;
}

/// Real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as u64
    }
}

/// Hand-driven clock for deterministic tests and demos.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self { now: AtomicU64::new(start_ms) }
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
