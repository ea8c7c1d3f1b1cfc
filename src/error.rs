//! Error types.
//!
//! Two layers:
//!
//! - [`FitError`]: the named failures of the fitting core. Every core operation
//!   either returns a valid result or one of these; none of them is fatal.
//! - [`AppError`]: what the binary reports (message + process exit code).

use thiserror::Error;

/// Exit code used for I/O and input-format problems.
pub const EXIT_IO: u8 = 2;
/// Exit code used for fitting failures that reach the top level.
pub const EXIT_FIT: u8 = 4;

/// Named failures of the measurement/fit core.
///
/// `Clone + PartialEq` so a failed evaluation can be cached on the measurement
/// and replayed when the same configuration is requested again.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("an entry named '{0}' already exists at this level")]
    DuplicateName(String),

    #[error("too few usable points in the fit window: found {found}, need at least {needed}")]
    DegenerateFit { found: usize, needed: usize },

    #[error("nonlinear fit did not converge: {0}")]
    FitDidNotConverge(String),

    #[error("fit window selects {found} points, too few for delta={delta}")]
    EmptyWindow { found: usize, delta: usize },

    #[error("invalid pixel offset {offset} for {len} samples (need 1 <= offset < len)")]
    InvalidOffset { offset: usize, len: usize },

    #[error("measurement '{0}' has not been fitted")]
    IncompleteFit(String),

    #[error("invalid spectrum '{name}': {reason}")]
    InvalidSpectrum { name: String, reason: String },

    #[error("no fit configuration has been applied")]
    NotConfigured,
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        AppError::new(EXIT_FIT, err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_errors_map_to_fit_exit_code() {
        let err: AppError = FitError::IncompleteFit("a".to_string()).into();
        assert_eq!(err.exit_code(), EXIT_FIT);
        assert!(err.to_string().contains("'a'"));
    }
}
