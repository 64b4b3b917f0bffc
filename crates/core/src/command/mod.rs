//! Operator command surface
//!
//! Commands are produced outside the control loop (network handler,
//! simulator, tests) and cross into it through a bounded lock-free SPSC
//! queue. The loop drains the queue at the top of each tick, so every
//! command is applied exactly once and at a defined point.

use core::fmt;

use heapless::spsc::Queue;

use crate::robot::DriveMode;

/// Queue slots for pending commands
pub const COMMAND_QUEUE_LEN: usize = 16;

/// Bounded queue carrying commands into the control loop
pub type CommandQueue = Queue<Command, COMMAND_QUEUE_LEN>;

/// Tunable parameters addressable by option key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKey {
    AngleP,
    AngleI,
    AngleD,
    SpeedP,
    SpeedI,
    SpeedD,
    YawP,
    YawI,
    YawD,
    PitchZero,
    TorqueLimit,
}

impl ParamKey {
    pub const ALL: [ParamKey; 11] = [
        Self::AngleP,
        Self::AngleI,
        Self::AngleD,
        Self::SpeedP,
        Self::SpeedI,
        Self::SpeedD,
        Self::YawP,
        Self::YawI,
        Self::YawD,
        Self::PitchZero,
        Self::TorqueLimit,
    ];

    /// Numeric wire code, where one exists
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::AngleP => Some("key01"),
            Self::AngleI => Some("key02"),
            Self::AngleD => Some("key03"),
            Self::SpeedP => Some("key04"),
            Self::SpeedI => Some("key05"),
            Self::SpeedD => Some("key06"),
            Self::YawP => Some("key10"),
            Self::YawI => Some("key11"),
            Self::YawD => Some("key12"),
            Self::PitchZero | Self::TorqueLimit => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AngleP => "angle_p",
            Self::AngleI => "angle_i",
            Self::AngleD => "angle_d",
            Self::SpeedP => "speed_p",
            Self::SpeedI => "speed_i",
            Self::SpeedD => "speed_d",
            Self::YawP => "yaw_p",
            Self::YawI => "yaw_i",
            Self::YawD => "yaw_d",
            Self::PitchZero => "pitch_zero",
            Self::TorqueLimit => "torque_limit",
        }
    }

    /// Accepts either the wire code or the descriptive name.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.name() == key || k.code() == Some(key))
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Start or stop balancing
    Run(bool),
    /// Enter or leave test mode; leaving resets the controller
    TestMode(bool),
    /// Driver mode for test-mode setpoints
    SetDriveMode(DriveMode),
    /// Raw per-wheel setpoints, honored only in test mode
    SetMotor { left: f32, right: f32 },
    /// Assert or clear the emergency stop
    EStop(bool),
    FallDetection(bool),
    OffGroundProtection(bool),
    /// Re-measure wheel deadzones; also drops the run command
    RecalibrateDeadzone,
    /// Re-estimate and persist the gyro bias
    RecalibrateGyro,
    /// Axes in [-1, 1]; clears the joystick stop
    Joystick { x: f32, y: f32 },
    SetParam { key: ParamKey, value: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// Command queue is full
    QueueFull,
    /// Parameter key not recognized
    UnknownKey,
    /// Value is NaN or infinite
    InvalidValue,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "Command queue full"),
            Self::UnknownKey => write!(f, "Unknown parameter key"),
            Self::InvalidValue => write!(f, "Invalid parameter value"),
        }
    }
}

impl Command {
    /// Build a parameter update from a wire key.
    pub fn set_param(key: &str, value: f32) -> Result<Self, CommandError> {
        let key = ParamKey::from_key(key).ok_or(CommandError::UnknownKey)?;
        if !value.is_finite() {
            return Err(CommandError::InvalidValue);
        }
        Ok(Self::SetParam { key, value })
    }

    /// Test drive mode from a wire name; unknown names select PWM.
    pub fn drive_mode(name: &str) -> Self {
        Self::SetDriveMode(DriveMode::from_name(name).unwrap_or_default())
    }
}

/// Push a command, reporting a full queue instead of blocking.
pub fn submit(queue: &mut CommandQueue, command: Command) -> Result<(), CommandError> {
    queue
        .enqueue(command)
        .map_err(|_| CommandError::QueueFull)
}

/// Raises the joystick stop when updates stop arriving.
#[derive(Debug, Clone)]
pub struct JoystickWatchdog {
    timeout_ms: u64,
    last_update_ms: Option<u64>,
}

impl JoystickWatchdog {
    pub const DEFAULT_TIMEOUT_MS: u64 = 500;

    pub fn new(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            last_update_ms: None,
        }
    }

    pub fn feed(&mut self, now_ms: u64) {
        self.last_update_ms = Some(now_ms);
    }

    /// True once an update has been seen and none arrived for the timeout.
    pub fn expired(&self, now_ms: u64) -> bool {
        self.last_update_ms
            .is_some_and(|last| now_ms.saturating_sub(last) > self.timeout_ms)
    }
}

impl Default for JoystickWatchdog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIMEOUT_MS)
    }
}
