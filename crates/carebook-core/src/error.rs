//! Error types for carebook-core

use thiserror::Error;

use crate::storage::StorageError;

/// Result type alias using carebook-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in carebook-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Durable write failed (quota, disabled or unreachable storage)
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether retrying the same action later may succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}
