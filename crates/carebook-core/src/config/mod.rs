//! Sync settings shared by every client.
//!
//! Serializable so clients can embed them in their own config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::normalize_text_option;
use crate::watcher::WatchConfig;

pub const DEFAULT_STORAGE_KEY: &str = "appointments";
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
const MIN_POLL_INTERVAL_MS: u64 = 50;
const MAX_POLL_INTERVAL_MS: u64 = 60_000;

/// Which key holds the collection and how often to poll it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SyncSettings {
    pub storage_key: String,
    pub poll_interval_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl SyncSettings {
    /// Trim the storage key and check the poll interval bounds.
    pub fn validated(mut self) -> Result<Self> {
        self.storage_key = normalize_text_option(Some(self.storage_key))
            .ok_or_else(|| Error::Config("storage_key must not be empty".to_string()))?;

        if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&self.poll_interval_ms) {
            return Err(Error::Config(format!(
                "poll_interval_ms must be between {MIN_POLL_INTERVAL_MS} and {MAX_POLL_INTERVAL_MS}, got {}",
                self.poll_interval_ms
            )));
        }

        Ok(self)
    }

    pub const fn watch_config(&self) -> WatchConfig {
        WatchConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = SyncSettings::default().validated().unwrap();
        assert_eq!(settings.storage_key, "appointments");
        assert_eq!(
            settings.watch_config().poll_interval,
            Duration::from_millis(500)
        );
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: SyncSettings = serde_json::from_str(r#"{"poll_interval_ms": 300}"#).unwrap();
        assert_eq!(settings.storage_key, DEFAULT_STORAGE_KEY);
        assert_eq!(settings.poll_interval_ms, 300);
    }

    #[test]
    fn rejects_unknown_fields() {
        let error = serde_json::from_str::<SyncSettings>(r#"{"interval": 300}"#).unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn validated_trims_key_and_rejects_blank() {
        let trimmed = SyncSettings {
            storage_key: "  patient-42  ".to_string(),
            ..SyncSettings::default()
        }
        .validated()
        .unwrap();
        assert_eq!(trimmed.storage_key, "patient-42");

        let blank = SyncSettings {
            storage_key: "   ".to_string(),
            ..SyncSettings::default()
        };
        assert!(matches!(blank.validated(), Err(Error::Config(_))));
    }

    #[test]
    fn validated_bounds_poll_interval() {
        for bad in [0, 10, 60_001] {
            let settings = SyncSettings {
                poll_interval_ms: bad,
                ..SyncSettings::default()
            };
            assert!(settings.validated().is_err(), "{bad} should be rejected");
        }
    }
}
