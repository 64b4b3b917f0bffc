//! Per-tick state surface
//!
//! The control loop is the only writer. At the end of each tick it copies
//! the fields observers care about into a [`TelemetrySnapshot`] and
//! publishes it through a critical-section mutex, so readers in other
//! contexts always see one whole tick.

use core::cell::Cell;

use critical_section::Mutex;

use crate::motion::MotionState;
use crate::robot::RobotState;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySnapshot {
    pub timestamp_ms: u64,
    pub state: MotionState,
    pub running: bool,
    pub fault: bool,
    pub estop: bool,
    pub lowbat_warn: bool,
    pub fallen: bool,
    pub off_ground: bool,
    pub pitch: f32,
    pub roll: f32,
    pub yaw: f32,
    pub pitch_zero: f32,
    pub torque_left: f32,
    pub torque_right: f32,
    pub speed_left: f32,
    pub speed_right: f32,
    pub deadzone_left: f32,
    pub deadzone_right: f32,
    pub battery_v: f32,
}

impl TelemetrySnapshot {
    pub const EMPTY: Self = Self {
        timestamp_ms: 0,
        state: MotionState::Init,
        running: false,
        fault: false,
        estop: false,
        lowbat_warn: false,
        fallen: false,
        off_ground: false,
        pitch: 0.0,
        roll: 0.0,
        yaw: 0.0,
        pitch_zero: 0.0,
        torque_left: 0.0,
        torque_right: 0.0,
        speed_left: 0.0,
        speed_right: 0.0,
        deadzone_left: 0.0,
        deadzone_right: 0.0,
        battery_v: 0.0,
    };

    pub fn capture(robot: &RobotState, now_ms: u64) -> Self {
        Self {
            timestamp_ms: now_ms,
            state: robot.state,
            running: robot.run,
            fault: robot.drv_fault,
            estop: robot.estop,
            lowbat_warn: robot.lowbat_warn,
            fallen: robot.fallen.is,
            off_ground: robot.off_ground,
            pitch: robot.imu.pitch,
            roll: robot.imu.roll,
            yaw: robot.imu.yaw,
            pitch_zero: robot.pitch_zero,
            torque_left: robot.tor.left,
            torque_right: robot.tor.right,
            speed_left: robot.w_left,
            speed_right: robot.w_right,
            deadzone_left: robot.tor.deadzone.left,
            deadzone_right: robot.tor.deadzone.right,
            battery_v: robot.battery_v,
        }
    }

    pub fn state_name(&self) -> &'static str {
        self.state.name()
    }
}

impl Default for TelemetrySnapshot {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Latest committed snapshot, shareable as a `static`.
pub struct SharedTelemetry {
    inner: Mutex<Cell<TelemetrySnapshot>>,
}

impl SharedTelemetry {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new(TelemetrySnapshot::EMPTY)),
        }
    }

    pub fn publish(&self, snapshot: TelemetrySnapshot) {
        critical_section::with(|cs| self.inner.borrow(cs).set(snapshot));
    }

    pub fn latest(&self) -> TelemetrySnapshot {
        critical_section::with(|cs| self.inner.borrow(cs).get())
    }
}

impl Default for SharedTelemetry {
    fn default() -> Self {
        Self::new()
    }
}
