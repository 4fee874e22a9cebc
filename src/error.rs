//! Error types and handling for the Stormwatch service

use thiserror::Error;

/// Main error type for the Stormwatch service
#[derive(Error, Debug)]
pub enum StormwatchError {
    /// Configuration-related errors (missing credential, bad settings)
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Upstream weather provider errors (non-2xx, malformed payload)
    #[error("Provider error: {message}")]
    Provider { message: String },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Cache operation errors
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// Alert store operation errors
    #[error("Store error: {message}")]
    Store { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// General application errors
    #[error("Application error: {message}")]
    General { message: String },
}

impl StormwatchError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new provider error
    pub fn provider<S: Into<String>>(message: S) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new cache error
    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Create a new store error
    pub fn store<S: Into<String>>(message: S) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Create a new general error
    pub fn general<S: Into<String>>(message: S) -> Self {
        Self::General {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            StormwatchError::Config { .. } | StormwatchError::Provider { .. } => {
                "Weather data unavailable. Please try again later.".to_string()
            }
            StormwatchError::Validation { message } => {
                format!("Invalid input: {message}")
            }
            StormwatchError::Cache { .. } => {
                "Cache operation failed. Weather data may be slower to load.".to_string()
            }
            StormwatchError::Store { .. } => {
                "Alert storage is temporarily unavailable.".to_string()
            }
            StormwatchError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
            StormwatchError::General { message } => message.clone(),
        }
    }
}
