//! Motion state machine
//!
//! Operating mode as a sum type plus a pure, priority-ordered transition
//! function. Safety conditions (e-stop, driver fault, battery, fall,
//! off-ground) pre-empt the nominal Init → Calibrating → Idle → Normal/Test
//! flow.

pub mod machine;
pub mod state;

pub use machine::{step, BatteryThresholds, MotionDecision, MotionInputs};
pub use state::MotionState;
