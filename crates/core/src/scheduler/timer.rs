//! Per-tick execution timing

use super::types::{TaskMetadata, TaskStats};
use crate::log_warn;

/// Measures each tick of a periodic loop.
///
/// Call [`begin`](Self::begin) at the top of the tick and
/// [`end`](Self::end) at the bottom, both with microsecond timestamps.
#[derive(Debug, Clone)]
pub struct LoopTimer {
    task: TaskMetadata,
    stats: TaskStats,
    last_start_us: Option<u64>,
    tick_start_us: u64,
    period_us: Option<u32>,
}

impl LoopTimer {
    pub fn new(task: TaskMetadata) -> Self {
        Self {
            task,
            stats: TaskStats::default(),
            last_start_us: None,
            tick_start_us: 0,
            period_us: None,
        }
    }

    pub fn task(&self) -> &TaskMetadata {
        &self.task
    }

    pub fn stats(&self) -> &TaskStats {
        &self.stats
    }

    pub fn begin(&mut self, now_us: u64) {
        self.period_us = self
            .last_start_us
            .map(|last| now_us.saturating_sub(last).min(u32::MAX as u64) as u32);
        self.last_start_us = Some(now_us);
        self.tick_start_us = now_us;
    }

    /// Close the tick. Returns the execution time in microseconds.
    pub fn end(&mut self, now_us: u64) -> u32 {
        let execution = now_us
            .saturating_sub(self.tick_start_us)
            .min(u32::MAX as u64) as u32;
        self.stats.update(execution, self.period_us, &self.task);
        if !self.task.is_within_budget(execution) {
            log_warn!(
                "{} tick overran: {} us (budget {} us)",
                self.task.name,
                execution,
                self.task.budget_us
            );
        }
        execution
    }
}
