//! Gyro bias estimation
//!
//! Two bias vectors are tracked:
//! - `base`: long-term bias, persisted, seeded from storage at init
//! - `run`: bias applied to every sample, re-estimated after boot and on request
//!
//! While the robot is quiescent the raw gyro is averaged over a fixed
//! window; the mean becomes the new run bias. An explicit request also
//! promotes the result to base so the caller can persist it.

use nalgebra::Vector3;

/// Estimation windows and quiescence thresholds
#[derive(Debug, Clone, Copy)]
pub struct GyroBiasConfig {
    /// Automatic re-estimation is allowed this long after the first sample
    pub warmup_ms: u64,
    /// Accumulation window length
    pub window_ms: u64,
    /// Quiescent only while |pitch| stays below this (deg)
    pub quiet_pitch_deg: f32,
    /// Quiescent only while |gyro_y| stays below this (deg/s)
    pub quiet_rate_dps: f32,
}

impl Default for GyroBiasConfig {
    fn default() -> Self {
        Self {
            warmup_ms: 1000,
            window_ms: 500,
            quiet_pitch_deg: 8.0,
            quiet_rate_dps: 20.0,
        }
    }
}

/// Result of a completed accumulation window
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BiasEvent {
    /// Run bias replaced (automatic warm-up estimate)
    RunUpdated(Vector3<f32>),
    /// Run bias replaced and promoted to base; must be persisted
    BasePromoted(Vector3<f32>),
}

#[derive(Debug, Clone)]
pub struct GyroBiasTracker {
    config: GyroBiasConfig,
    base: Vector3<f32>,
    run: Vector3<f32>,
    boot_ms: Option<u64>,
    window_start_ms: Option<u64>,
    sum: Vector3<f32>,
    count: u32,
}

impl GyroBiasTracker {
    pub fn new(config: GyroBiasConfig) -> Self {
        Self {
            config,
            base: Vector3::zeros(),
            run: Vector3::zeros(),
            boot_ms: None,
            window_start_ms: None,
            sum: Vector3::zeros(),
            count: 0,
        }
    }

    /// Seed both base and run bias from a persisted value.
    pub fn load_base(&mut self, bias: Vector3<f32>) {
        self.base = bias;
        self.run = bias;
    }

    pub fn base(&self) -> Vector3<f32> {
        self.base
    }

    pub fn run(&self) -> Vector3<f32> {
        self.run
    }

    /// True while a window is accumulating
    pub fn is_accumulating(&self) -> bool {
        self.window_start_ms.is_some()
    }

    /// Raw sample minus the active run bias
    pub fn correct(&self, raw: Vector3<f32>) -> Vector3<f32> {
        raw - self.run
    }

    /// Feed one raw sample.
    ///
    /// `requested` is an explicit recalibration request; when the window it
    /// drives completes, [`BiasEvent::BasePromoted`] is returned and the
    /// caller consumes the request.
    pub fn update(
        &mut self,
        raw: Vector3<f32>,
        pitch_deg: f32,
        joystick_idle: bool,
        requested: bool,
        now_ms: u64,
    ) -> Option<BiasEvent> {
        let boot = *self.boot_ms.get_or_insert(now_ms);

        let quiet = libm::fabsf(pitch_deg) < self.config.quiet_pitch_deg
            && libm::fabsf(raw.y) < self.config.quiet_rate_dps
            && joystick_idle;
        let in_warmup = now_ms.saturating_sub(boot) < self.config.warmup_ms;

        if !(quiet && (in_warmup || requested)) {
            self.discard();
            return None;
        }

        let start = *self.window_start_ms.get_or_insert(now_ms);
        self.sum += raw;
        self.count += 1;

        if now_ms.saturating_sub(start) < self.config.window_ms {
            return None;
        }

        let mean = self.sum / self.count as f32;
        self.run = mean;
        self.discard();

        if requested {
            self.base = mean;
            Some(BiasEvent::BasePromoted(mean))
        } else {
            Some(BiasEvent::RunUpdated(mean))
        }
    }

    fn discard(&mut self) {
        self.window_start_ms = None;
        self.sum = Vector3::zeros();
        self.count = 0;
    }
}

impl Default for GyroBiasTracker {
    fn default() -> Self {
        Self::new(GyroBiasConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bias() -> Vector3<f32> {
        Vector3::new(0.5, -1.2, 0.3)
    }

    fn feed(
        tracker: &mut GyroBiasTracker,
        from_ms: u64,
        to_ms: u64,
        requested: bool,
    ) -> Option<BiasEvent> {
        let mut last = None;
        let mut t = from_ms;
        while t <= to_ms {
            if let Some(ev) = tracker.update(bias(), 0.0, true, requested, t) {
                last = Some(ev);
            }
            t += 2;
        }
        last
    }

    #[test]
    fn test_warmup_estimates_run_bias() {
        let mut tracker = GyroBiasTracker::default();
        let event = feed(&mut tracker, 0, 600, false);
        match event {
            Some(BiasEvent::RunUpdated(b)) => assert!((b - bias()).norm() < 1e-5),
            other => panic!("unexpected event {:?}", other),
        }
        assert!((tracker.run() - bias()).norm() < 1e-5);
        assert_eq!(tracker.base(), Vector3::zeros());
    }

    #[test]
    fn test_no_estimate_after_warmup_without_request() {
        let mut tracker = GyroBiasTracker::default();
        tracker.update(Vector3::zeros(), 0.0, true, false, 0);
        let event = feed(&mut tracker, 2_000, 3_000, false);
        assert!(event.is_none());
        assert_eq!(tracker.run(), Vector3::zeros());
    }

    #[test]
    fn test_motion_discards_partial_window() {
        let mut tracker = GyroBiasTracker::default();
        feed(&mut tracker, 0, 400, false);
        assert!(tracker.is_accumulating());

        // Large pitch rate breaks quiescence
        tracker.update(Vector3::new(0.0, 50.0, 0.0), 0.0, true, false, 402);
        assert!(!tracker.is_accumulating());
        assert_eq!(tracker.run(), Vector3::zeros());
    }

    #[test]
    fn test_joystick_activity_blocks_estimate() {
        let mut tracker = GyroBiasTracker::default();
        let mut t = 0;
        while t <= 600 {
            assert!(tracker.update(bias(), 0.0, false, false, t).is_none());
            t += 2;
        }
    }

    #[test]
    fn test_request_promotes_to_base() {
        let mut tracker = GyroBiasTracker::default();
        tracker.update(Vector3::zeros(), 0.0, true, false, 0);
        let event = feed(&mut tracker, 5_000, 5_600, true);
        match event {
            Some(BiasEvent::BasePromoted(b)) => assert!((b - bias()).norm() < 1e-5),
            other => panic!("unexpected event {:?}", other),
        }
        assert!((tracker.base() - bias()).norm() < 1e-5);
    }

    #[test]
    fn test_load_base_seeds_run_and_corrects() {
        let mut tracker = GyroBiasTracker::default();
        tracker.load_base(bias());
        assert_eq!(tracker.run(), bias());
        assert_eq!(tracker.correct(bias()), Vector3::zeros());
    }
}
