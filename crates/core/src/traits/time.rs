//! Monotonic time abstraction.
//!
//! The balance loop reads the clock once at the top of each tick and passes
//! the millisecond timestamp down, so every duration inside a tick is
//! computed against the same instant.

use core::cell::Cell;

/// Platform-agnostic monotonic clock.
///
/// # Example
///
/// ```
/// use balbot_core::traits::{MockTime, TimeSource};
///
/// fn due<T: TimeSource>(time: &T, last_tick_ms: &mut u64, period_ms: u64) -> bool {
///     let now = time.now_ms();
///     if now.saturating_sub(*last_tick_ms) >= period_ms {
///         *last_tick_ms = now;
///         return true;
///     }
///     false
/// }
///
/// let time = MockTime::new();
/// let mut last = 0;
/// time.advance_ms(2);
/// assert!(due(&time, &mut last, 2));
/// assert!(!due(&time, &mut last, 2));
/// ```
pub trait TimeSource: Clone + Send + Sync {
    /// Milliseconds since boot.
    fn now_ms(&self) -> u64;

    /// Microseconds since boot, for tick-duration statistics.
    fn now_us(&self) -> u64;

    /// Milliseconds elapsed since `reference_ms`, saturating at zero.
    fn elapsed_ms_since(&self, reference_ms: u64) -> u64 {
        self.now_ms().saturating_sub(reference_ms)
    }
}

// ============================================================================
// Mock Implementation (always available for testing)
// ============================================================================

/// Manually advanced clock for deterministic tests and lockstep simulation.
#[derive(Clone, Default)]
pub struct MockTime {
    current_us: Cell<u64>,
}

// Safety: MockTime is only driven from a single thread (unit tests or the
// lockstep simulator), where Cell is sound.
unsafe impl Send for MockTime {}
unsafe impl Sync for MockTime {}

impl MockTime {
    pub fn new() -> Self {
        Self {
            current_us: Cell::new(0),
        }
    }

    pub fn with_initial_ms(ms: u64) -> Self {
        Self {
            current_us: Cell::new(ms * 1000),
        }
    }

    pub fn set_ms(&self, ms: u64) {
        self.current_us.set(ms * 1000);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance_us(ms * 1000);
    }

    pub fn advance_us(&self, us: u64) {
        self.current_us.set(self.current_us.get() + us);
    }
}

impl TimeSource for MockTime {
    fn now_ms(&self) -> u64 {
        self.current_us.get() / 1000
    }

    fn now_us(&self) -> u64 {
        self.current_us.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_time_starts_at_zero() {
        let time = MockTime::new();
        assert_eq!(time.now_ms(), 0);
        assert_eq!(time.now_us(), 0);
    }

    #[test]
    fn test_mock_time_tick_stepping() {
        let time = MockTime::with_initial_ms(10);
        for _ in 0..5 {
            time.advance_ms(2);
        }
        assert_eq!(time.now_ms(), 20);
    }

    #[test]
    fn test_mock_time_sub_millisecond_rounds_down() {
        let time = MockTime::new();
        time.advance_us(1_999);
        assert_eq!(time.now_ms(), 1);
        time.advance_us(1);
        assert_eq!(time.now_ms(), 2);
    }

    #[test]
    fn test_elapsed_saturates_for_future_reference() {
        let time = MockTime::new();
        time.set_ms(100);
        assert_eq!(time.elapsed_ms_since(40), 60);
        assert_eq!(time.elapsed_ms_since(500), 0);
    }
}
