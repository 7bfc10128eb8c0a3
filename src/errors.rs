use thiserror::Error;

/// Error taxonomy for the inference engine.
///
/// Parameter and data errors are surfaced immediately at the API boundary.
/// Convergence and WAIC failures are *not* represented here: they degrade
/// gracefully into `Diagnostics` / `Option<WaicInfo>` instead of aborting a
/// fit that otherwise succeeded.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("invalid parameters: {message}")]
    InvalidParameters { message: String },

    #[error("invalid data: {message}")]
    InvalidData { message: String },

    #[error("not enough data: need at least {needed}, got {got}")]
    NotEnoughData { needed: usize, got: usize },

    #[error("model hint {hint} is incompatible with the detected data shape ({shape})")]
    ModelMismatch { hint: String, shape: String },

    #[error("WAIC unavailable: {message}")]
    WAICUnavailable { message: String },

    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    pub(crate) fn invalid_parameters(message: impl Into<String>) -> Self {
        Error::InvalidParameters {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_data(message: impl Into<String>) -> Self {
        Error::InvalidData {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
