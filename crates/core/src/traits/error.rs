//! Peripheral error types
//!
//! Every driver maps its bus-level failure onto one of these. The balance
//! loop never propagates them past the tick: sensor errors raise the driver
//! fault flag, store and actuator errors are logged.

use core::fmt;

/// Sensor read failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Device did not acknowledge on the bus
    NoResponse,
    /// Device answered with out-of-range or corrupt data
    InvalidData,
    /// Bus transaction timed out
    Timeout,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::NoResponse => write!(f, "sensor not responding"),
            SensorError::InvalidData => write!(f, "sensor returned invalid data"),
            SensorError::Timeout => write!(f, "sensor read timed out"),
        }
    }
}

/// Persistence backend failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// Backend is full or the key cannot be created
    NoSpace,
    /// Write did not complete
    WriteFailed,
    /// Stored value has the wrong shape
    Corrupt,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NoSpace => write!(f, "persistent store full"),
            StoreError::WriteFailed => write!(f, "persistent store write failed"),
            StoreError::Corrupt => write!(f, "persistent store entry corrupt"),
        }
    }
}

/// Motor driver failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// Driver reported a fault (over-current, under-voltage, ...)
    DriverFault,
    /// Driver does not support the requested drive mode
    Unsupported,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuatorError::DriverFault => write!(f, "motor driver fault"),
            ActuatorError::Unsupported => write!(f, "drive mode unsupported"),
        }
    }
}
