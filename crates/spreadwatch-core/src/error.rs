//! Error types for the core primitives.

use thiserror::Error;

/// A specialized Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while building core domain values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Invalid or unparseable date.
    #[error("Invalid date: {message}")]
    InvalidDate {
        /// Description of the date error.
        message: String,
    },

    /// Invalid or unparseable tenor.
    #[error("Invalid tenor: {message}")]
    InvalidTenor {
        /// Description of the tenor error.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid date error.
    pub fn invalid_date(message: impl Into<String>) -> Self {
        Self::InvalidDate {
            message: message.into(),
        }
    }

    /// Creates an invalid tenor error.
    pub fn invalid_tenor(message: impl Into<String>) -> Self {
        Self::InvalidTenor {
            message: message.into(),
        }
    }
}
