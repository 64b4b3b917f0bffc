//! Battery Parameter Definitions
//!
//! # Parameters
//!
//! - `BATT_WARN_VOLT` - Low-battery warning threshold (V)
//! - `BATT_EMPTY_VOLT` - Shutdown threshold (V)
//! - `BATT_HYST_VOLT` - Rise above the warning threshold needed to leave LowBat (V)

use super::error::ParameterError;
use super::storage::{ParamFlags, ParamValue, ParameterStore};
use crate::motion::BatteryThresholds;

/// Battery parameters loaded from parameter store
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryParams {
    pub warn_voltage: f32,
    pub empty_voltage: f32,
    pub hysteresis: f32,
}

impl BatteryParams {
    /// Register battery parameters with default values
    pub fn register_defaults(store: &mut ParameterStore) -> Result<(), ParameterError> {
        let d = BatteryThresholds::default();
        store.register("BATT_WARN_VOLT", ParamValue::Float(d.warn), ParamFlags::empty())?;
        store.register("BATT_EMPTY_VOLT", ParamValue::Float(d.empty), ParamFlags::empty())?;
        store.register(
            "BATT_HYST_VOLT",
            ParamValue::Float(d.release_delta),
            ParamFlags::empty(),
        )?;
        Ok(())
    }

    /// Load battery parameters, falling back to defaults for missing keys
    pub fn from_store(store: &ParameterStore) -> Self {
        let d = BatteryThresholds::default();
        Self {
            warn_voltage: store.get_f32("BATT_WARN_VOLT").unwrap_or(d.warn),
            empty_voltage: store.get_f32("BATT_EMPTY_VOLT").unwrap_or(d.empty),
            hysteresis: store.get_f32("BATT_HYST_VOLT").unwrap_or(d.release_delta),
        }
    }

    /// Empty must sit below warn and the release band must be positive
    pub fn is_configured(&self) -> bool {
        self.empty_voltage > 0.0 && self.empty_voltage < self.warn_voltage && self.hysteresis > 0.0
    }

    pub fn thresholds(&self) -> BatteryThresholds {
        BatteryThresholds {
            warn: self.warn_voltage,
            empty: self.empty_voltage,
            release_delta: self.hysteresis,
        }
    }
}
