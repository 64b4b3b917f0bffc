//! Control loop timing
//!
//! - [`types`]: loop metadata and execution statistics
//! - [`timer`]: per-tick measurement around the balance step

pub mod timer;
pub mod types;

pub use timer::LoopTimer;
pub use types::{TaskMetadata, TaskStats};

/// The balance loop: 500 Hz with a 1.5 ms execution budget
pub const BALANCE_TASK: TaskMetadata = TaskMetadata {
    name: "balance",
    rate_hz: 500,
    budget_us: 1_500,
};
