//! Derived sensing: wheel speeds, fall and off-ground classification,
//! quiescence checks and reference-angle adaptation.

pub mod fall;
pub mod offground;
pub mod quiet;
pub mod wheel;

pub use fall::{FallConfig, FallDetector};
pub use offground::{OffGroundConfig, OffGroundDetector, OffGroundInputs};
pub use quiet::{
    joystick_idle, PitchZeroAdapter, PitchZeroConfig, RecoveryConfig, RecoveryReady,
    JOYSTICK_DEADBAND,
};
pub use wheel::WheelSpeedEstimator;
