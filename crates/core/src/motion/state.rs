//! Motion state enumeration

/// Operating state of the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionState {
    #[default]
    Init,
    Calibrating,
    Idle,
    Normal,
    OffGround,
    Test,
    LowBat,
    Fallen,
    EStop,
    Fault,
    Shutdown,
}

impl MotionState {
    /// Stable name reported on the telemetry surface
    pub fn name(&self) -> &'static str {
        match self {
            MotionState::Init => "Init",
            MotionState::Calibrating => "Calibrating",
            MotionState::Idle => "Idle",
            MotionState::Normal => "Normal",
            MotionState::OffGround => "OffGround",
            MotionState::Test => "Test",
            MotionState::LowBat => "LowBat",
            MotionState::Fallen => "Fallen",
            MotionState::EStop => "EStop",
            MotionState::Fault => "Fault",
            MotionState::Shutdown => "Shutdown",
        }
    }

    /// Safety states that never drive the wheels through the cascade
    pub fn is_safety_stop(&self) -> bool {
        matches!(
            self,
            MotionState::EStop | MotionState::Fault | MotionState::Shutdown | MotionState::OffGround
        )
    }
}

impl core::fmt::Display for MotionState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
