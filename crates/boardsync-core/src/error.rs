//! Centralized error types for boardsync.

use thiserror::Error;

/// Main error type for boardsync core operations.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Invalid API URL '{url}': {reason}")]
    InvalidApiUrl { url: String, reason: String },

    #[error("Missing bearer token")]
    MissingToken,

    #[error("Missing board id")]
    MissingBoard,

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config file error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for boardsync core operations.
pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    /// Create an invalid API URL error.
    pub fn invalid_api_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidApiUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
