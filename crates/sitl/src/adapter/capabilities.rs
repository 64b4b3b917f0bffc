/// What a plant simulator models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatorCapabilities {
    pub imu: bool,
    pub wheel_encoders: bool,
    pub battery: bool,
    /// Steps per second of simulated time.
    pub max_rate_hz: u32,
    /// Body pitch is integrated (false: robot held on a stand).
    pub free_body: bool,
    /// Wheel static friction is modelled, so deadzone calibration has
    /// something to find.
    pub friction: bool,
}

impl SimulatorCapabilities {
    pub fn rate_for_step(step_size_us: u64) -> u32 {
        (1_000_000 / step_size_us.max(1)) as u32
    }

    /// Every peripheral the balance loop reads is simulated.
    pub fn has_all_sensors(&self) -> bool {
        self.imu && self.wheel_encoders && self.battery
    }
}

impl Default for SimulatorCapabilities {
    fn default() -> Self {
        Self {
            imu: true,
            wheel_encoders: true,
            battery: true,
            max_rate_hz: 500,
            free_body: true,
            friction: true,
        }
    }
}
