//! Error types for the export manager.

use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt record: {0}")]
    Codec(String),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::IoError(std::io::Error::new(
            std::io::ErrorKind::Other,
            err.to_string(),
        ))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Codec(err.to_string())
    }
}

/// Errors surfaced by the export flow
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Plugin discovery failed: {0}")]
    Discovery(String),

    #[error("Unknown export plugin: {0}")]
    UnknownPlugin(String),

    /// Template resolution failed. Deliberately carries no path.
    #[error("Invalid template")]
    TemplateRejected,

    #[error("Plugin '{plugin}' has no route named '{route}'")]
    UnknownRoute { plugin: String, route: String },

    #[error("Could not schedule validation job: {0}")]
    Scheduling(String),

    #[error("Handoff context is {size} bytes, limit is {limit}")]
    HandoffTooLarge { size: usize, limit: usize },

    #[error("Handoff token is unknown or expired")]
    HandoffExpired,

    #[error("Validator '{name}' failed: {message}")]
    Validator { name: String, message: String },

    #[error("Project content error: {0}")]
    ContentError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
