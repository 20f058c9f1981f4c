//! Error types for roomkeeper core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while loading or validating shared state.
#[derive(Debug, Error)]
pub enum CoreError {
    /// I/O error while reading a configuration file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration file is not valid JSON or has the wrong shape.
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Configuration parsed but violates a constraint.
    #[error("invalid config: {message}")]
    InvalidConfig {
        /// Description of the violated constraint.
        message: String,
    },

    /// A room identifier could not be parsed.
    #[error("invalid room id: {input:?}")]
    InvalidRoomId {
        /// The rejected input.
        input: String,
    },
}

impl CoreError {
    /// Creates an invalid-config error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
