//! Closed-loop balance control
//!
//! - [`pid`]: generic PID used by the speed and yaw loops
//! - [`cascade`]: speed → pitch → yaw cascade and torque mixing

pub mod cascade;
pub mod pid;

pub use cascade::{mix_torques, CascadeConfig, CascadeController, PitchLoop, PitchSample};
pub use pid::{sanitize_dt, Pid};
