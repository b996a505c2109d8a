use std::path::Path;

use carebook_core::util::normalize_text_option;

use crate::cli::ConfigCommands;
use crate::config::{process_env, CliConfig, Overrides};
use crate::error::CliError;

pub fn run_config(
    command: ConfigCommands,
    config_path: &Path,
    overrides: &Overrides,
) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            storage_key,
            poll_interval_ms,
        } => {
            let config = run_config_init(config_path, overrides, storage_key, poll_interval_ms)?;
            println!("Config written to {}", config_path.display());
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        ConfigCommands::Show => run_config_show(config_path, overrides),
    }
}

/// Merge the given values into the config file at `config_path`.
pub fn run_config_init(
    config_path: &Path,
    overrides: &Overrides,
    storage_key: Option<String>,
    poll_interval_ms: Option<u64>,
) -> Result<CliConfig, CliError> {
    let mut config = CliConfig::load_from_path(config_path).map_err(CliError::Config)?;

    if let Some(backend) = overrides.backend {
        config.backend = backend;
    }
    if let Some(path) = overrides.data_path.clone() {
        config.data_path = Some(path);
    }
    if let Some(key) = normalize_text_option(storage_key) {
        config.sync.storage_key = key;
    }
    if let Some(interval) = poll_interval_ms {
        config.sync.poll_interval_ms = interval;
    }
    if let Some(path) = overrides.seed_path.clone() {
        config.seed_path = Some(path);
    }

    config.sync = config.sync.validated()?;
    config.save_to_path(config_path).map_err(CliError::Config)?;
    Ok(config)
}

pub fn run_config_show(config_path: &Path, overrides: &Overrides) -> Result<(), CliError> {
    let config = CliConfig::load_from_path(config_path).map_err(CliError::Config)?;
    let effective = config.resolve(overrides, process_env)?;

    let exists = if config_path.exists() { "" } else { " (not created)" };
    println!("Config file: {}{exists}", config_path.display());
    println!("{}", serde_json::to_string_pretty(&effective)?);
    Ok(())
}
