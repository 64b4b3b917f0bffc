//! Robot state model
//!
//! `RobotState` is the single long-lived record the balance loop mutates
//! each tick. Everything is plain data; behavior lives in the component
//! modules that read and write it.

use nalgebra::Vector3;

use crate::ahrs::Attitude;
use crate::calibration::Deadzone;
use crate::motion::MotionState;

/// Upper bound on raw PWM duty in test mode
pub const TEST_PWM_MAX: i16 = 1000;

/// Gains and limits for one control axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidGains {
    pub p: f32,
    pub i: f32,
    pub d: f32,
    /// Output slew limit (units/s)
    pub ramp: f32,
    /// Output magnitude limit
    pub limit: f32,
}

impl PidGains {
    pub const fn new(p: f32, i: f32, d: f32, ramp: f32, limit: f32) -> Self {
        Self {
            p,
            i,
            d,
            ramp,
            limit,
        }
    }

    /// Pitch loop defaults; `d` is the gyro damping gain
    pub const fn angle_default() -> Self {
        Self::new(0.6, 5.0, 0.016, 100_000.0, 250.0)
    }

    /// Speed loop defaults; `limit` is the pitch offset bound in degrees
    pub const fn speed_default() -> Self {
        Self::new(0.003, 0.0001, 0.0, 100_000.0, 5.0)
    }

    pub const fn yaw_default() -> Self {
        Self::new(0.025, 0.0, 0.0, 100_000.0, 5.0)
    }
}

/// Runtime state of one control axis
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AxisState {
    pub now: f32,
    pub last: f32,
    pub target: f32,
    pub error: f32,
    pub output: f32,
}

/// Torque split for the current tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TorqueState {
    /// Pitch loop output
    pub base: f32,
    /// Yaw loop output
    pub yaw: f32,
    pub left: f32,
    pub right: f32,
    pub deadzone: Deadzone,
}

/// Joystick axes in [-1, 1] with their scale coefficients
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Joystick {
    /// Turn axis
    pub x: f32,
    /// Drive axis
    pub y: f32,
    /// Yaw target per unit of `x` (deg)
    pub x_coef: f32,
    /// Speed target per unit of `y` (rad/s)
    pub y_coef: f32,
}

impl Default for Joystick {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            x_coef: 0.1,
            y_coef: 10.0,
        }
    }
}

/// Fall detection mirror for the state surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallenState {
    pub is: bool,
    pub count: u8,
    pub enable: bool,
}

impl Default for FallenState {
    fn default() -> Self {
        Self {
            is: false,
            count: 0,
            enable: true,
        }
    }
}

/// Motor driver mode used while test mode is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriveMode {
    #[default]
    Pwm,
    Speed,
    Position,
}

impl DriveMode {
    /// Parse the wire names `pwm`, `speed` and `pos`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pwm" => Some(Self::Pwm),
            "speed" | "vel" => Some(Self::Speed),
            "pos" | "position" => Some(Self::Position),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Pwm => "pwm",
            Self::Speed => "speed",
            Self::Position => "pos",
        }
    }
}

/// Raw per-wheel setpoint in test mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TestSetpoint {
    /// Duty in [-1000, 1000]
    Pwm(i16),
    /// rad/s
    Speed(f32),
    /// rad
    Position(f32),
}

impl TestSetpoint {
    /// Interpret a raw value in `mode`. PWM is rounded and clamped.
    pub fn from_raw(mode: DriveMode, value: f32) -> Self {
        match mode {
            DriveMode::Pwm => {
                let max = TEST_PWM_MAX as f32;
                Self::Pwm(libm::roundf(value.clamp(-max, max)) as i16)
            }
            DriveMode::Speed => Self::Speed(value),
            DriveMode::Position => Self::Position(value),
        }
    }

    pub fn zero(mode: DriveMode) -> Self {
        Self::from_raw(mode, 0.0)
    }

    /// Setpoint as a bare number in its own unit
    pub fn raw(&self) -> f32 {
        match *self {
            Self::Pwm(duty) => duty as f32,
            Self::Speed(v) | Self::Position(v) => v,
        }
    }

    pub fn mode(&self) -> DriveMode {
        match self {
            Self::Pwm(_) => DriveMode::Pwm,
            Self::Speed(_) => DriveMode::Speed,
            Self::Position(_) => DriveMode::Position,
        }
    }
}

/// Test-mode override
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestOverride {
    pub mode: DriveMode,
    pub left: TestSetpoint,
    pub right: TestSetpoint,
}

impl TestOverride {
    pub fn new(mode: DriveMode) -> Self {
        Self {
            mode,
            left: TestSetpoint::zero(mode),
            right: TestSetpoint::zero(mode),
        }
    }
}

impl Default for TestOverride {
    fn default() -> Self {
        Self::new(DriveMode::default())
    }
}

/// What the actuator receives this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriveCommand {
    /// Closed-loop torque per wheel
    Torque { left: f32, right: f32 },
    /// Raw override in the selected driver mode
    Test {
        left: TestSetpoint,
        right: TestSetpoint,
    },
}

impl DriveCommand {
    pub const ZERO: Self = Self::Torque {
        left: 0.0,
        right: 0.0,
    };

    pub const fn torque(left: f32, right: f32) -> Self {
        Self::Torque { left, right }
    }

    pub fn is_zero_torque(&self) -> bool {
        matches!(self, Self::Torque { left, right } if *left == 0.0 && *right == 0.0)
    }
}

impl Default for DriveCommand {
    fn default() -> Self {
        Self::ZERO
    }
}

#[derive(Debug, Clone)]
pub struct RobotState {
    // Mode flags
    pub run: bool,
    pub test_cmd: bool,
    pub estop: bool,
    pub drv_fault: bool,
    pub joy_stop_control: bool,
    pub lowbat_warn: bool,
    /// Deadzone recalibration pending
    pub recalib_req: bool,
    /// Gyro bias re-estimation pending
    pub gyro_recalib_req: bool,
    /// When false the off-ground flag is still tracked but ignored
    pub offground_protect: bool,
    pub off_ground: bool,

    pub state: MotionState,
    /// Reference pitch the robot balances around (deg)
    pub pitch_zero: f32,
    pub tor: TorqueState,
    /// Wheel speeds (rad/s)
    pub w_left: f32,
    pub w_right: f32,
    pub battery_v: f32,

    /// Gyro biases (deg/s)
    pub gyro_base: Vector3<f32>,
    pub gyro_run: Vector3<f32>,

    pub imu: Attitude,
    pub imu_l: Attitude,
    pub imu_zero: Attitude,

    pub joy: Joystick,
    pub joy_l: Joystick,
    pub fallen: FallenState,

    pub ang: AxisState,
    pub spd: AxisState,
    pub yaw: AxisState,
    pub ang_pid: PidGains,
    pub spd_pid: PidGains,
    pub yaw_pid: PidGains,

    /// Joint clamp on both wheel torques
    pub torque_limit: f32,
    pub test: TestOverride,
    /// Speed loop feed-forward on d(target)/dt
    pub speed_ff: f32,
    /// Pitch loop gravity compensation gain
    pub gravity_ff: f32,
}

impl RobotState {
    pub const DEFAULT_PITCH_ZERO: f32 = -2.1;
    pub const DEFAULT_TORQUE_LIMIT: f32 = 25.0;

    pub fn new() -> Self {
        Self {
            run: false,
            test_cmd: false,
            estop: false,
            drv_fault: false,
            joy_stop_control: false,
            lowbat_warn: false,
            recalib_req: false,
            gyro_recalib_req: false,
            offground_protect: true,
            off_ground: false,
            state: MotionState::Init,
            pitch_zero: Self::DEFAULT_PITCH_ZERO,
            tor: TorqueState::default(),
            w_left: 0.0,
            w_right: 0.0,
            battery_v: 0.0,
            gyro_base: Vector3::zeros(),
            gyro_run: Vector3::zeros(),
            imu: Attitude::default(),
            imu_l: Attitude::default(),
            imu_zero: Attitude::default(),
            joy: Joystick::default(),
            joy_l: Joystick::default(),
            fallen: FallenState::default(),
            ang: AxisState::default(),
            spd: AxisState::default(),
            yaw: AxisState::default(),
            ang_pid: PidGains::angle_default(),
            spd_pid: PidGains::speed_default(),
            yaw_pid: PidGains::yaw_default(),
            torque_limit: Self::DEFAULT_TORQUE_LIMIT,
            test: TestOverride::default(),
            speed_ff: 0.0,
            gravity_ff: 2.0,
        }
    }

    /// Mean wheel speed (rad/s)
    pub fn wheel_speed(&self) -> f32 {
        0.5 * (self.w_left + self.w_right)
    }
}

impl Default for RobotState {
    fn default() -> Self {
        Self::new()
    }
}
