//! balbot_core - Pure no_std balance control for a two-wheeled robot
//!
//! This crate contains the platform-agnostic control core: attitude
//! estimation, the motion state machine, deadzone calibration, the balance
//! cascade and fall recovery. Everything runs on host without feature flags.
//!
//! # Design Principles
//!
//! - **Zero cfg**: No `#[cfg(feature = ...)]` directives allowed
//! - **Pure no_std**: No std library dependencies
//! - **Trait abstractions**: Sensors, motors, clock and persistence injected via traits
//!
//! # Modules
//!
//! - [`traits`]: Hardware, clock and persistence abstractions
//! - [`ahrs`]: Mahony attitude filter and gyro bias tracking
//! - [`sense`]: Wheel speed, fall, off-ground and quiescence detectors
//! - [`calibration`]: Motor deadzone calibration
//! - [`motion`]: Motion state machine
//! - [`control`]: PID and the speed/pitch/yaw cascade
//! - [`recovery`]: Swing-up and soft takeover after a fall
//! - [`robot`]: Shared robot state and drive commands
//! - [`command`]: Operator command channel and joystick watchdog
//! - [`parameters`]: Named parameter store and tunable groups
//! - [`scheduler`]: Balance task timing
//! - [`telemetry`]: Snapshot published each tick
//! - [`balance`]: The periodic loop tying everything together
//! - [`logging`]: Logging macros over the `log` facade

#![no_std]

pub mod ahrs;
pub mod balance;
pub mod calibration;
pub mod command;
pub mod control;
pub mod logging;
pub mod motion;
pub mod parameters;
pub mod recovery;
pub mod robot;
pub mod scheduler;
pub mod sense;
pub mod telemetry;
pub mod traits;

pub use balance::{BalanceConfig, BalanceLoop, SensorFrame};
pub use motion::MotionState;
pub use robot::{DriveCommand, RobotState};
