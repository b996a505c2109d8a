//! In-process storage shared by every store built on the same instance.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast;

use super::{ContextId, StorageBackend, StorageChange, StorageError};

const CHANGE_FEED_CAPACITY: usize = 64;

/// Map-backed storage with a change feed and an optional byte quota.
///
/// Behaves like browser local storage shared between tabs: every write is
/// announced on the change feed, and writes that would push the total size
/// over the quota fail with [`StorageError::QuotaExceeded`].
#[derive(Debug)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
    changes: broadcast::Sender<StorageChange>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            entries: Mutex::new(HashMap::new()),
            quota_bytes: None,
            changes,
        }
    }

    /// Limit the total size (keys plus values, in bytes) of stored entries.
    #[must_use]
    pub const fn with_quota(mut self, quota_bytes: usize) -> Self {
        self.quota_bytes = Some(quota_bytes);
        self
    }

    /// Write without announcing the change, as when a push signal is lost.
    pub fn insert_silently(&self, key: &str, value: &str) {
        self.lock().insert(key.to_string(), value.to_string());
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.lock().remove(key)
    }

    /// Total bytes currently stored.
    pub fn used_bytes(&self) -> usize {
        self.lock()
            .iter()
            .map(|(key, value)| key.len() + value.len())
            .sum()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str, origin: ContextId) -> Result<(), StorageError> {
        {
            let mut entries = self.lock();
            if let Some(quota) = self.quota_bytes {
                let others: usize = entries
                    .iter()
                    .filter(|(existing, _)| existing.as_str() != key)
                    .map(|(existing, stored)| existing.len() + stored.len())
                    .sum();
                let needed = others + key.len() + value.len();
                if needed > quota {
                    return Err(StorageError::QuotaExceeded { needed, quota });
                }
            }
            entries.insert(key.to_string(), value.to_string());
        }

        // No receivers is fine: nobody is watching yet.
        let _ = self.changes.send(StorageChange {
            key: key.to_string(),
            origin,
        });
        Ok(())
    }

    fn changes(&self) -> Option<broadcast::Receiver<StorageChange>> {
        Some(self.changes.subscribe())
    }
}
