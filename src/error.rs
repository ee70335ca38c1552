//! Error taxonomy shared by the engine and the HTTP layer

use std::time::Duration;

/// Errors surfaced by request admission and model execution
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SoloError {
    /// Malformed or out-of-range request field. Raised before any model access.
    #[error("invalid value for '{field}': {reason}")]
    Validation { field: String, reason: String },

    /// The model could not be brought to a ready state. Retryable.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// Gave up waiting for exclusive model access.
    #[error("model busy: no execution slot within {0:?}")]
    Busy(Duration),

    /// Unexpected runtime failure during generation.
    #[error("{0}")]
    Internal(String),

    /// The peer went away mid-generation.
    #[error("request cancelled by client")]
    Cancelled,
}

impl SoloError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether a client may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ModelUnavailable(_) | Self::Busy(_))
    }
}

pub type Result<T, E = SoloError> = std::result::Result<T, E>;
