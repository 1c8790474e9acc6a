//! Error types for gymcal.

use thiserror::Error;

/// Errors that can occur while planning or applying a calendar sync.
#[derive(Error, Debug)]
pub enum GymCalError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid event '{event}' on {date}: {reason}")]
    Validation {
        event: String,
        date: String,
        reason: String,
    },

    #[error("Calendar service error ({}): {message}", .status.map_or_else(|| "network".to_string(), |s| format!("HTTP {s}")))]
    Remote {
        status: Option<u16>,
        message: String,
    },

    #[error("ICS generation error: {0}")]
    IcsGenerate(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl GymCalError {
    /// Build a remote error from an HTTP status code and response text.
    pub fn remote(status: Option<u16>, message: impl Into<String>) -> Self {
        GymCalError::Remote {
            status,
            message: message.into(),
        }
    }

    /// Whether retrying the failed call could succeed.
    ///
    /// Network failures (no status), rate limiting and server errors are
    /// transient. Everything else is a hard failure.
    pub fn is_transient(&self) -> bool {
        match self {
            GymCalError::Remote { status: None, .. } => true,
            GymCalError::Remote {
                status: Some(code), ..
            } => *code == 429 || (500..600).contains(code),
            _ => false,
        }
    }
}

impl From<toml::de::Error> for GymCalError {
    fn from(err: toml::de::Error) -> Self {
        GymCalError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for GymCalError {
    fn from(err: serde_json::Error) -> Self {
        GymCalError::Serialization(err.to_string())
    }
}

/// Result type alias for gymcal operations.
pub type GymCalResult<T> = Result<T, GymCalError>;
