//! Loop metadata and runtime statistics

/// Static description of a periodic loop
#[derive(Debug, Clone, Copy)]
pub struct TaskMetadata {
    /// Name used in log lines
    pub name: &'static str,

    /// Target execution rate in Hz
    pub rate_hz: u32,

    /// Execution time budget in microseconds
    ///
    /// A tick that runs longer counts as a deadline miss.
    pub budget_us: u32,
}

impl TaskMetadata {
    #[inline]
    pub const fn period_us(&self) -> u32 {
        1_000_000 / self.rate_hz
    }

    #[inline]
    pub const fn period_ms(&self) -> u64 {
        (self.period_us() / 1000) as u64
    }

    #[inline]
    pub const fn is_within_budget(&self, execution_us: u32) -> bool {
        execution_us <= self.budget_us
    }
}

/// Runtime statistics for one loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStats {
    pub last_execution_us: u32,

    /// Exponential moving average, alpha = 0.1
    pub avg_execution_us: u32,

    pub max_execution_us: u32,

    /// Ticks whose execution exceeded the budget
    pub deadline_misses: u32,

    /// Time between the last two tick starts
    pub last_period_us: u32,

    /// EMA of |period - target period|
    pub avg_jitter_us: u32,

    pub execution_count: u64,
}

impl TaskStats {
    /// Record one tick. `period_us` is `None` for the first tick.
    pub fn update(&mut self, execution_us: u32, period_us: Option<u32>, task: &TaskMetadata) {
        self.last_execution_us = execution_us;
        self.execution_count = self.execution_count.saturating_add(1);

        // avg = (value + 9 * avg) / 10
        self.avg_execution_us = if self.execution_count == 1 {
            execution_us
        } else {
            ((execution_us as u64 + 9 * self.avg_execution_us as u64) / 10) as u32
        };
        self.max_execution_us = self.max_execution_us.max(execution_us);

        if !task.is_within_budget(execution_us) {
            self.deadline_misses = self.deadline_misses.saturating_add(1);
        }

        if let Some(period) = period_us {
            self.last_period_us = period;
            let jitter = period.abs_diff(task.period_us());
            self.avg_jitter_us = if self.execution_count == 2 {
                jitter
            } else {
                ((jitter as u64 + 9 * self.avg_jitter_us as u64) / 10) as u32
            };
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
