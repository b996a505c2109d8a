//! Carebook CLI - Book and track appointments from the terminal
//!
//! Every command opens the shared collection through the same store the
//! other clients use, so `carebook watch` in one terminal follows bookings
//! made from another.

mod cli;
mod commands;
mod config;
mod error;

use carebook_core::RecordStatus;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::book::{build_candidate, run_book};
use crate::commands::common::open_store;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::list::run_list;
use crate::commands::status::run_set_status;
use crate::commands::summary::run_summary;
use crate::commands::watch::run_watch;
use crate::config::{default_config_path, process_env, CliConfig, EffectiveConfig, Overrides};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("carebook=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let overrides = Overrides {
        backend: cli.backend,
        data_path: cli.data_path,
        seed_path: cli.seed,
    };

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Commands::Config { command } => run_config(command, &config_path, &overrides),
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref()),
        command => {
            let effective = CliConfig::load_from_path(&config_path)
                .map_err(CliError::Config)?
                .resolve(&overrides, process_env)?;
            run_store_command(command, &effective).await
        }
    }
}

async fn run_store_command(command: Commands, effective: &EffectiveConfig) -> Result<(), CliError> {
    let store = open_store(effective)?;

    match command {
        Commands::Book {
            subject,
            counterpart,
            date,
            time,
            specialty,
            id,
            fields,
        } => {
            let candidate =
                build_candidate(subject, counterpart, date, time, specialty, id.as_deref(), &fields)?;
            run_book(candidate, &store)?;
        }
        Commands::List { view, limit, json } => run_list(view, limit, json, &store)?,
        Commands::Confirm { id } => {
            run_set_status(&id, RecordStatus::Confirmed, &store)?;
        }
        Commands::Complete { id } => {
            run_set_status(&id, RecordStatus::Completed, &store)?;
        }
        Commands::Cancel { id } => {
            run_set_status(&id, RecordStatus::Cancelled, &store)?;
        }
        Commands::Summary { json } => run_summary(json, &store)?,
        Commands::Watch => run_watch(store, effective.sync.watch_config()).await?,
        Commands::Config { .. } | Commands::Completions { .. } => {}
    }

    Ok(())
}
