use balbot_core::telemetry::TelemetrySnapshot;
use serde::{Deserialize, Serialize};

/// IMU sensor data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuData {
    /// Specific force in g (body frame, [x, y, z]).
    pub accel_g: [f32; 3],
    /// Angular rate in deg/s (body frame, [x, y, z]).
    pub gyro_dps: [f32; 3],
}

/// Everything the robot's peripherals would report for one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorData {
    /// Timestamp in microseconds (simulation time).
    pub timestamp_us: u64,
    pub imu: ImuData,
    /// Absolute shaft angles in [0, 2π) rad, [left, right].
    pub wheel_angle_rad: [f32; 2],
    /// Pack voltage in volts.
    pub battery_v: f32,
}

/// Wheel torques sent to a simulator.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ActuatorCommands {
    /// Timestamp in microseconds (simulation time).
    pub timestamp_us: u64,
    /// [left, right]
    pub torque: [f32; 2],
}

/// One telemetry line as emitted by the simulator binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub t_ms: u64,
    pub state: String,
    pub run: bool,
    pub fault: bool,
    pub estop: bool,
    pub lowbat: bool,
    pub fallen: bool,
    pub off_ground: bool,
    pub pitch: f32,
    pub roll: f32,
    pub yaw: f32,
    pub pitch_zero: f32,
    pub torque: [f32; 2],
    pub wheel_speed: [f32; 2],
    pub deadzone: [f32; 2],
    pub battery_v: f32,
}

impl From<&TelemetrySnapshot> for TelemetryRecord {
    fn from(s: &TelemetrySnapshot) -> Self {
        Self {
            t_ms: s.timestamp_ms,
            state: s.state_name().to_string(),
            run: s.running,
            fault: s.fault,
            estop: s.estop,
            lowbat: s.lowbat_warn,
            fallen: s.fallen,
            off_ground: s.off_ground,
            pitch: s.pitch,
            roll: s.roll,
            yaw: s.yaw,
            pitch_zero: s.pitch_zero,
            torque: [s.torque_left, s.torque_right],
            wheel_speed: [s.speed_left, s.speed_right],
            deadzone: [s.deadzone_left, s.deadzone_right],
            battery_v: s.battery_v,
        }
    }
}
