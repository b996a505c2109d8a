//! Persistent CLI configuration.

use std::path::{Path, PathBuf};

use carebook_core::config::SyncSettings;
use carebook_core::util::normalize_text_option;
use serde::{Deserialize, Serialize};

use crate::cli::BackendKind;
use crate::error::CliError;

const APP_DIR_NAME: &str = "carebook";
const CONFIG_FILE_NAME: &str = "cli-config.json";
pub const DATA_PATH_ENV: &str = "CAREBOOK_DATA_PATH";
pub const STORAGE_KEY_ENV: &str = "CAREBOOK_STORAGE_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_path: Option<PathBuf>,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_path: Option<PathBuf>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            version: default_config_version(),
            backend: BackendKind::default(),
            data_path: None,
            sync: SyncSettings::default(),
            seed_path: None,
        }
    }
}

/// Command-line flags that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub backend: Option<BackendKind>,
    pub data_path: Option<PathBuf>,
    pub seed_path: Option<PathBuf>,
}

/// Settings after applying flags, environment and defaults.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub backend: BackendKind,
    pub data_path: PathBuf,
    pub sync: SyncSettings,
    pub seed_path: Option<PathBuf>,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> PathBuf {
    app_dir(dirs::config_dir()).join(CONFIG_FILE_NAME)
}

pub fn default_data_path(backend: BackendKind) -> PathBuf {
    let dir = app_dir(dirs::data_dir());
    match backend {
        BackendKind::Sqlite => dir.join("carebook.db"),
        BackendKind::File => dir.join("store"),
    }
}

fn app_dir(root: Option<PathBuf>) -> PathBuf {
    root.unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR_NAME)
}

pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn normalize_path_option(value: Option<PathBuf>) -> Option<PathBuf> {
    value.filter(|path| !path.as_os_str().is_empty())
}

impl CliConfig {
    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    /// Merge flags, then `env`, then this file, then defaults.
    pub fn resolve(
        &self,
        overrides: &Overrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<EffectiveConfig, CliError> {
        let backend = overrides.backend.unwrap_or(self.backend);
        let data_path = normalize_path_option(overrides.data_path.clone())
            .or_else(|| normalize_text_option(env(DATA_PATH_ENV)).map(PathBuf::from))
            .or_else(|| self.data_path.clone())
            .unwrap_or_else(|| default_data_path(backend));

        let mut sync = self.sync.clone();
        if let Some(key) = normalize_text_option(env(STORAGE_KEY_ENV)) {
            sync.storage_key = key;
        }

        Ok(EffectiveConfig {
            backend,
            data_path,
            sync: sync.validated()?,
            seed_path: normalize_path_option(overrides.seed_path.clone())
                .or_else(|| self.seed_path.clone()),
        })
    }

    fn normalize(&mut self) {
        self.data_path = normalize_path_option(self.data_path.take());
        self.seed_path = normalize_path_option(self.seed_path.take());
        self.sync.storage_key = self.sync.storage_key.trim().to_string();
    }
}
