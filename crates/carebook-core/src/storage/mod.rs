//! Durable key/value backends for the shared collection.
//!
//! A backend maps one string key to one JSON document. Reads and writes are
//! synchronous. Backends that can observe writes made by other contexts expose
//! a change feed; the others are covered by the watcher's poll.

mod file;
mod memory;
mod migrations;
mod sqlite;

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

/// Identity of one store instance (one "tab").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(Uuid);

impl ContextId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A write observed on a backend's change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub key: String,
    /// Context that performed the write
    pub origin: ContextId,
}

/// Failures raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("quota exceeded: write needs {needed} bytes, quota is {quota}")]
    QuotaExceeded { needed: usize, quota: usize },

    #[error("{0}")]
    Unavailable(String),
}

/// Synchronous keyed storage holding serialized collections.
pub trait StorageBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Read the raw value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value stored under `key`.
    ///
    /// `origin` identifies the writing context so change-feed listeners can
    /// skip their own writes.
    fn set(&self, key: &str, value: &str, origin: ContextId) -> Result<(), StorageError>;

    /// Push notifications for writes, when the backend can provide them.
    fn changes(&self) -> Option<broadcast::Receiver<StorageChange>> {
        None
    }
}
