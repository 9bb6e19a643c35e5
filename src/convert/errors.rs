//! # Conversion Errors

use thiserror::Error;

/// Result type for conversions
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Conversion errors
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Element separator is empty")]
    EmptySeparator,

    #[error("Record encodes to an empty token")]
    EmptyToken,

    #[error("Malformed token {token:?}: {reason}")]
    Malformed { token: String, reason: String },

    #[error("JSON conversion failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConvertError {
    /// A token that could not be parsed into a record
    pub fn malformed(token: impl Into<String>, reason: impl Into<String>) -> Self {
        ConvertError::Malformed {
            token: token.into(),
            reason: reason.into(),
        }
    }
}
