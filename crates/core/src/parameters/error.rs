//! Parameter store errors

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterError {
    /// Name was never registered
    InvalidConfig,
    /// Name does not fit a key
    NameTooLong,
    /// All slots are taken
    StoreFull,
    /// Registered `READ_ONLY`
    ReadOnly,
}

impl core::fmt::Display for ParameterError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidConfig => write!(f, "unknown parameter"),
            Self::NameTooLong => {
                write!(f, "parameter name exceeds {} bytes", super::PARAM_NAME_LEN)
            }
            Self::StoreFull => write!(f, "no free parameter slot"),
            Self::ReadOnly => write!(f, "parameter is read-only"),
        }
    }
}
