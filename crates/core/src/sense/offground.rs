//! Off-ground ("wheels spinning in the air") detection.
//!
//! Entry needs fast wheels, non-trivial torque and a near-level body held
//! for `spin_ms`; exit needs slow wheels and a near-level body held for
//! `settle_ms`. Any tick that breaks a condition restarts its dwell timer.

#[derive(Debug, Clone, Copy)]
pub struct OffGroundConfig {
    /// Minimum |torque| on at least one wheel (Nm)
    pub torque_min: f32,
    /// Both wheels above this to enter (rad/s)
    pub speed_high: f32,
    /// Both wheels below this to exit (rad/s)
    pub speed_low: f32,
    /// |pitch| must stay below this (deg)
    pub level_pitch_deg: f32,
    /// Entry dwell (ms)
    pub spin_ms: u64,
    /// Exit dwell (ms)
    pub settle_ms: u64,
}

impl Default for OffGroundConfig {
    fn default() -> Self {
        Self {
            torque_min: 0.015,
            speed_high: 150.0,
            speed_low: 50.0,
            level_pitch_deg: 6.0,
            spin_ms: 120,
            settle_ms: 400,
        }
    }
}

/// Signals sampled once per tick
#[derive(Debug, Clone, Copy, Default)]
pub struct OffGroundInputs {
    pub speed_left: f32,
    pub speed_right: f32,
    pub torque_left: f32,
    pub torque_right: f32,
    pub pitch_deg: f32,
}

#[derive(Debug, Clone)]
pub struct OffGroundDetector {
    config: OffGroundConfig,
    off_ground: bool,
    enter_since: Option<u64>,
    exit_since: Option<u64>,
}

impl OffGroundDetector {
    pub fn new(config: OffGroundConfig) -> Self {
        Self {
            config,
            off_ground: false,
            enter_since: None,
            exit_since: None,
        }
    }

    pub fn is_off_ground(&self) -> bool {
        self.off_ground
    }

    pub fn reset(&mut self) {
        self.off_ground = false;
        self.enter_since = None;
        self.exit_since = None;
    }

    pub fn update(&mut self, input: &OffGroundInputs, now_ms: u64) -> bool {
        let c = &self.config;
        let wl = libm::fabsf(input.speed_left);
        let wr = libm::fabsf(input.speed_right);
        let level = libm::fabsf(input.pitch_deg) < c.level_pitch_deg;

        let spinning = wl > c.speed_high && wr > c.speed_high;
        let driven = libm::fabsf(input.torque_left) > c.torque_min
            || libm::fabsf(input.torque_right) > c.torque_min;
        let settled = wl < c.speed_low && wr < c.speed_low;

        if !self.off_ground && spinning && driven && level {
            let since = *self.enter_since.get_or_insert(now_ms);
            if now_ms.saturating_sub(since) >= c.spin_ms {
                self.off_ground = true;
                self.exit_since = None;
            }
        } else {
            self.enter_since = None;
        }

        if self.off_ground && settled && level {
            let since = *self.exit_since.get_or_insert(now_ms);
            if now_ms.saturating_sub(since) >= c.settle_ms {
                self.off_ground = false;
                self.enter_since = None;
            }
        } else {
            self.exit_since = None;
        }

        self.off_ground
    }
}

impl Default for OffGroundDetector {
    fn default() -> Self {
        Self::new(OffGroundConfig::default())
    }
}
