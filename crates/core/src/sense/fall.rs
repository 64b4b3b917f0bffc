//! Fall detection with a consecutive-sample debounce.

#[derive(Debug, Clone, Copy)]
pub struct FallConfig {
    /// Upper pitch bound (deg)
    pub max_pitch_deg: f32,
    /// Lower pitch bound (deg)
    pub min_pitch_deg: f32,
    /// Consecutive out-of-range samples before the robot counts as fallen
    pub count_max: u32,
}

impl Default for FallConfig {
    fn default() -> Self {
        Self {
            max_pitch_deg: 30.0,
            min_pitch_deg: -30.0,
            count_max: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FallDetector {
    config: FallConfig,
    enabled: bool,
    count: u32,
    fallen: bool,
}

impl FallDetector {
    pub fn new(config: FallConfig) -> Self {
        Self {
            config,
            enabled: true,
            count: 0,
            fallen: false,
        }
    }

    pub fn is_fallen(&self) -> bool {
        self.fallen
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Disabling also clears the current classification.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.count = 0;
            self.fallen = false;
        }
    }

    pub fn update(&mut self, pitch_deg: f32) -> bool {
        if !self.enabled {
            return false;
        }
        if pitch_deg > self.config.max_pitch_deg || pitch_deg < self.config.min_pitch_deg {
            self.count = self.count.saturating_add(1);
            if self.count >= self.config.count_max {
                self.fallen = true;
            }
        } else {
            self.count = 0;
            self.fallen = false;
        }
        self.fallen
    }
}

impl Default for FallDetector {
    fn default() -> Self {
        Self::new(FallConfig::default())
    }
}
