//! Calibration persistence on top of the parameter store
//!
//! Results are kept as hidden parameters, each group with a presence flag
//! so a value that was never saved is told apart from a saved default.
//!
//! - `CAL_DZ_OK`, `CAL_DZ_L`, `CAL_DZ_R` - wheel deadzones
//! - `CAL_GYRO_OK`, `CAL_GYRO_X/Y/Z` - long-term gyro bias (deg/s)
//! - `CAL_PZERO_OK`, `CAL_PZERO` - balance reference pitch (deg)

use nalgebra::Vector3;

use super::error::ParameterError;
use super::storage::{ParamFlags, ParamValue, ParameterStore};
use crate::calibration::Deadzone;
use crate::traits::{CalibrationStore, StoreError};

impl From<ParameterError> for StoreError {
    fn from(e: ParameterError) -> Self {
        match e {
            ParameterError::StoreFull | ParameterError::NameTooLong => StoreError::NoSpace,
            ParameterError::InvalidConfig | ParameterError::ReadOnly => StoreError::WriteFailed,
        }
    }
}

fn present(store: &ParameterStore, flag: &str) -> bool {
    store.get_bool(flag).unwrap_or(false)
}

fn load(store: &ParameterStore, name: &str) -> Option<f32> {
    store.get_f32(name).filter(|v| v.is_finite())
}

fn save(store: &mut ParameterStore, values: &[(&str, f32)], flag: &str) -> Result<(), StoreError> {
    for (name, value) in values {
        store.upsert(name, ParamValue::Float(*value), ParamFlags::HIDDEN)?;
    }
    store.upsert(flag, ParamValue::Bool(true), ParamFlags::HIDDEN)?;
    Ok(())
}

impl CalibrationStore for ParameterStore {
    fn load_deadzone(&self) -> Option<Deadzone> {
        if !present(self, "CAL_DZ_OK") {
            return None;
        }
        Some(Deadzone::new(load(self, "CAL_DZ_L")?, load(self, "CAL_DZ_R")?))
    }

    fn save_deadzone(&mut self, deadzone: Deadzone) -> Result<(), StoreError> {
        save(
            self,
            &[("CAL_DZ_L", deadzone.left), ("CAL_DZ_R", deadzone.right)],
            "CAL_DZ_OK",
        )
    }

    fn load_gyro_bias(&self) -> Option<Vector3<f32>> {
        if !present(self, "CAL_GYRO_OK") {
            return None;
        }
        Some(Vector3::new(
            load(self, "CAL_GYRO_X")?,
            load(self, "CAL_GYRO_Y")?,
            load(self, "CAL_GYRO_Z")?,
        ))
    }

    fn save_gyro_bias(&mut self, bias: Vector3<f32>) -> Result<(), StoreError> {
        save(
            self,
            &[
                ("CAL_GYRO_X", bias.x),
                ("CAL_GYRO_Y", bias.y),
                ("CAL_GYRO_Z", bias.z),
            ],
            "CAL_GYRO_OK",
        )
    }

    fn load_pitch_zero(&self) -> Option<f32> {
        if !present(self, "CAL_PZERO_OK") {
            return None;
        }
        load(self, "CAL_PZERO")
    }

    fn save_pitch_zero(&mut self, pitch_zero: f32) -> Result<(), StoreError> {
        save(self, &[("CAL_PZERO", pitch_zero)], "CAL_PZERO_OK")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_store_has_nothing() {
        let store = ParameterStore::new();
        assert_eq!(store.load_deadzone(), None);
        assert_eq!(store.load_gyro_bias(), None);
        assert_eq!(store.load_pitch_zero(), None);
    }

    #[test]
    fn test_saved_zero_is_present() {
        let mut store = ParameterStore::new();
        store.save_pitch_zero(0.0).unwrap();
        assert_eq!(store.load_pitch_zero(), Some(0.0));
    }

    #[test]
    fn test_round_trip_all_groups() {
        let mut store = ParameterStore::new();
        store.save_deadzone(Deadzone::new(0.4, 0.55)).unwrap();
        store.save_gyro_bias(Vector3::new(0.1, -0.7, 0.02)).unwrap();
        store.save_pitch_zero(-1.8).unwrap();

        assert_eq!(store.load_deadzone(), Some(Deadzone::new(0.4, 0.55)));
        assert_eq!(store.load_gyro_bias(), Some(Vector3::new(0.1, -0.7, 0.02)));
        assert_eq!(store.load_pitch_zero(), Some(-1.8));
    }

    #[test]
    fn test_calibration_keys_are_hidden() {
        let mut store = ParameterStore::new();
        store.save_deadzone(Deadzone::uniform(0.3)).unwrap();
        assert!(store.is_hidden("CAL_DZ_L"));
        assert!(store.is_hidden("CAL_DZ_OK"));
        assert_eq!(store.count(), 0);
        assert!(store.is_dirty());
    }

    #[test]
    fn test_read_only_key_maps_to_write_failed() {
        let mut store = ParameterStore::new();
        store
            .register("CAL_PZERO", ParamValue::Float(0.0), ParamFlags::READ_ONLY)
            .unwrap();
        assert_eq!(store.save_pitch_zero(1.0), Err(StoreError::WriteFailed));
    }
}
