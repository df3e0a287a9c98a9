//! Time sources
//!
//! All accrual math is a pure function of elapsed seconds. Components never read the
//! wall clock directly; they are handed a `TimeSource`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::types::Timestamp;

/// Monotonic wall-clock seconds
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Shared handle to a time source
pub type SharedClock = Arc<dyn TimeSource>;

/// Wall clock backed by `chrono::Utc`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now().timestamp().max(0) as Timestamp
    }
}

/// Manually driven clock for tests and simulation
///
/// Never moves backwards: `set` to an earlier instant is ignored.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    pub fn shared(start: Timestamp) -> Arc<Self> {
        Arc::new(Self::new(start))
    }

    /// Move the clock forward by `secs`
    pub fn advance(&self, secs: u64) -> Timestamp {
        self.now.fetch_add(secs, Ordering::SeqCst) + secs
    }

    pub fn set(&self, ts: Timestamp) {
        self.now.fetch_max(ts, Ordering::SeqCst);
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now(), 1_000);
        assert_eq!(clock.advance(60), 1_060);
        assert_eq!(clock.now(), 1_060);
    }

    #[test]
    fn test_manual_clock_is_monotonic() {
        let clock = ManualClock::new(500);
        clock.set(100);
        assert_eq!(clock.now(), 500);
        clock.set(900);
        assert_eq!(clock.now(), 900);
    }

    #[test]
    fn test_system_clock_after_2020() {
        assert!(SystemClock.now() > 1_577_836_800);
    }
}
