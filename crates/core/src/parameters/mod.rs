//! Runtime parameters
//!
//! A fixed-capacity [`ParameterStore`] holds controller tunables and, as
//! hidden keys, persisted calibration results. Backends that save the
//! store to flash or disk live outside this crate.

pub mod balance;
pub mod battery;
pub mod calibration;
pub mod error;
pub mod storage;

pub use balance::BalanceParams;
pub use battery::BatteryParams;
pub use error::ParameterError;
pub use storage::{ParamFlags, ParamMetadata, ParamValue, ParameterStore};
pub use storage::{MAX_PARAMS, PARAM_NAME_LEN};
