use std::io;

use carebook_core::storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] carebook_core::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Record ID cannot be empty")]
    EmptyRecordId,
    #[error("Appointment not found for id/prefix: {0}")]
    RecordNotFound(String),
    #[error("{0}")]
    AmbiguousRecordId(String),
    #[error("Invalid --field value '{0}': expected KEY=VALUE")]
    InvalidField(String),
    #[error("Failed to load seed file: {0}")]
    Seed(String),
    #[error("Configuration error: {0}")]
    Config(String),
}
