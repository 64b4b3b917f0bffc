//! Simulation clock.
//!
//! The plant owns simulated time; the bridge copies each sensor timestamp
//! into a [`SimClock`] before the tick so the balance loop reads the
//! plant's time through [`TimeSource`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use balbot_core::traits::TimeSource;

/// Monotonic clock following the plant's timestamps. Clones share one
/// counter.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now_us: Arc<AtomicU64>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to `timestamp_us`. Earlier timestamps are ignored so the loop
    /// never sees time run backwards. Returns the time advanced.
    pub fn sync_to(&self, timestamp_us: u64) -> u64 {
        let previous = self.now_us.fetch_max(timestamp_us, Ordering::AcqRel);
        timestamp_us.saturating_sub(previous)
    }

    /// Restart from `timestamp_us`, e.g. after the plant reconnects.
    pub fn reset_to(&self, timestamp_us: u64) {
        self.now_us.store(timestamp_us, Ordering::Release);
    }
}

impl TimeSource for SimClock {
    fn now_ms(&self) -> u64 {
        self.now_us() / 1000
    }

    fn now_us(&self) -> u64 {
        self.now_us.load(Ordering::Acquire)
    }
}
