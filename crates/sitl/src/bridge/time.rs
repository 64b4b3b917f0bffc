use std::time::Duration;

/// Time synchronization mode for the SITL simulation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TimeMode {
    /// Plant and controller advance in lockstep as fast as possible.
    #[default]
    Lockstep,
    /// Each step is paced against wall-clock time, scaled by `factor`
    /// (2.0 runs twice as fast as real time).
    Scaled { factor: f32 },
}

impl TimeMode {
    /// Wall-clock time to spend on one step of `step_us` simulated time.
    pub fn pace(&self, step_us: u64) -> Option<Duration> {
        match *self {
            TimeMode::Lockstep => None,
            TimeMode::Scaled { factor } if factor > 0.0 => {
                Some(Duration::from_micros(step_us).div_f32(factor))
            }
            TimeMode::Scaled { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lockstep_does_not_pace() {
        assert_eq!(TimeMode::Lockstep.pace(2000), None);
    }

    #[test]
    fn test_scaled_pace() {
        let mode = TimeMode::Scaled { factor: 2.0 };
        assert_eq!(mode.pace(2000), Some(Duration::from_micros(1000)));
        assert_eq!(TimeMode::Scaled { factor: 0.0 }.pace(2000), None);
    }
}
