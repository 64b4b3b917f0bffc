//! Quiescence checks: joystick idle, fall-recovery readiness and the slow
//! adaptation of the balance reference angle.

/// Joystick axes below this magnitude count as released
pub const JOYSTICK_DEADBAND: f32 = 0.05;

pub fn joystick_idle(x: f32, y: f32) -> bool {
    libm::fabsf(x) < JOYSTICK_DEADBAND && libm::fabsf(y) < JOYSTICK_DEADBAND
}

#[derive(Debug, Clone, Copy)]
pub struct RecoveryConfig {
    pub pitch_deg: f32,
    pub rate_dps: f32,
    pub hold_ms: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            pitch_deg: 5.0,
            rate_dps: 5.0,
            hold_ms: 1000,
        }
    }
}

/// Upright-and-still detector used to leave the Fallen state.
#[derive(Debug, Clone)]
pub struct RecoveryReady {
    config: RecoveryConfig,
    since: Option<u64>,
}

impl RecoveryReady {
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            config,
            since: None,
        }
    }

    pub fn reset(&mut self) {
        self.since = None;
    }

    pub fn update(&mut self, pitch_deg: f32, pitch_rate_dps: f32, now_ms: u64) -> bool {
        if libm::fabsf(pitch_deg) < self.config.pitch_deg
            && libm::fabsf(pitch_rate_dps) < self.config.rate_dps
        {
            let since = *self.since.get_or_insert(now_ms);
            now_ms.saturating_sub(since) >= self.config.hold_ms
        } else {
            self.since = None;
            false
        }
    }
}

impl Default for RecoveryReady {
    fn default() -> Self {
        Self::new(RecoveryConfig::default())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PitchZeroConfig {
    /// Adapt only while |pitch| is below this (deg)
    pub deadband_deg: f32,
    /// Adapt only while |pitch rate| is below this (deg/s)
    pub rate_dps: f32,
    /// Fraction of the error absorbed per tick
    pub rate: f32,
}

impl Default for PitchZeroConfig {
    fn default() -> Self {
        Self {
            deadband_deg: 2.0,
            rate_dps: 8.0,
            rate: 0.0005,
        }
    }
}

/// First-order drift of `pitch_zero` toward the measured resting pitch.
///
/// Each step absorbs `rate` of the current error, so a single tick moves the
/// reference by a small bounded amount. Total drift is not clamped.
#[derive(Debug, Clone, Copy, Default)]
pub struct PitchZeroAdapter {
    config: PitchZeroConfig,
}

impl PitchZeroAdapter {
    pub fn new(config: PitchZeroConfig) -> Self {
        Self { config }
    }

    /// Returns the adapted reference. Unchanged unless quiescent.
    pub fn adapt(
        &self,
        pitch_zero: f32,
        pitch_deg: f32,
        pitch_rate_dps: f32,
        joystick_idle: bool,
    ) -> f32 {
        let quiet = libm::fabsf(pitch_deg) < self.config.deadband_deg
            && libm::fabsf(pitch_rate_dps) < self.config.rate_dps
            && joystick_idle;
        if !quiet {
            return pitch_zero;
        }
        pitch_zero + (pitch_deg - pitch_zero) * self.config.rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joystick_deadband() {
        assert!(joystick_idle(0.0, 0.0));
        assert!(joystick_idle(0.049, -0.049));
        assert!(!joystick_idle(0.05, 0.0));
        assert!(!joystick_idle(0.0, -0.3));
    }

    #[test]
    fn test_recovery_needs_full_hold() {
        let mut ready = RecoveryReady::default();
        let mut t = 0;
        while t < 1000 {
            assert!(!ready.update(1.0, 0.5, t));
            t += 2;
        }
        assert!(ready.update(1.0, 0.5, 1000));
    }

    #[test]
    fn test_recovery_resets_on_motion() {
        let mut ready = RecoveryReady::default();
        ready.update(1.0, 0.5, 0);
        ready.update(1.0, 0.5, 900);
        assert!(!ready.update(1.0, 6.0, 902));
        assert!(!ready.update(1.0, 0.5, 1500));
        assert!(ready.update(1.0, 0.5, 2500));
    }

    #[test]
    fn test_pitch_zero_moves_toward_pitch() {
        let adapter = PitchZeroAdapter::default();
        let z = adapter.adapt(-2.1, -1.0, 0.0, true);
        assert!((z - (-2.1 + 1.1 * 0.0005)).abs() < 1e-6);
    }

    #[test]
    fn test_pitch_zero_frozen_when_not_quiet() {
        let adapter = PitchZeroAdapter::default();
        assert_eq!(adapter.adapt(-2.1, 3.0, 0.0, true), -2.1);
        assert_eq!(adapter.adapt(-2.1, 1.0, 9.0, true), -2.1);
        assert_eq!(adapter.adapt(-2.1, 1.0, 0.0, false), -2.1);
    }

    #[test]
    fn test_pitch_zero_step_is_bounded() {
        let adapter = PitchZeroAdapter::default();
        let mut z = 0.0;
        for _ in 0..100 {
            let next = adapter.adapt(z, 1.99, 0.0, true);
            assert!((next - z).abs() <= 2.0 * 0.0005);
            z = next;
        }
        assert!(z > 0.0 && z < 1.99);
    }
}
