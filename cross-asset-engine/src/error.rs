use smol_str::SmolStr;
use thiserror::Error;

/// All errors generated in `cross-asset-engine`.
///
/// Analytics never fail: insufficient data, missing components and numerical degeneracy
/// are reported through `Option` and status values. These variants cover configuration
/// and rejected input only.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("failed to parse environment variable {key}={value}")]
    EnvVar { key: &'static str, value: String },

    #[error("rejected update for {symbol}: {field} is not finite")]
    NonFiniteValue { symbol: SmolStr, field: &'static str },
}

impl EngineError {
    /// Determine if the error was caused by a single bad input record, as opposed to
    /// a misconfigured engine.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_input_error(&self) -> bool {
        match self {
            EngineError::NonFiniteValue { .. } => true,
            _ => false,
        }
    }
}
