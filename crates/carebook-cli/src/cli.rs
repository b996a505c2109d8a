use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "carebook")]
#[command(about = "Book and track appointments from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to the CLI config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Database file (sqlite) or directory (file) holding the collection
    #[arg(long, global = true, value_name = "PATH")]
    pub data_path: Option<PathBuf>,

    /// Storage backend
    #[arg(long, global = true, value_enum)]
    pub backend: Option<BackendKind>,

    /// JSON array of records written when the collection does not exist yet
    #[arg(long, global = true, value_name = "PATH")]
    pub seed: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Book an appointment
    #[command(alias = "add")]
    Book {
        /// Who the appointment is for
        #[arg(long, visible_alias = "patient")]
        subject: String,
        /// Who the appointment is with
        #[arg(long = "with", visible_alias = "doctor", value_name = "NAME")]
        counterpart: String,
        /// Appointment date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        /// Clock time, e.g. 09:30 or 2:15 PM
        #[arg(long)]
        time: String,
        #[arg(long)]
        specialty: Option<String>,
        /// Use this id instead of generating one
        #[arg(long)]
        id: Option<String>,
        /// Extra field stored with the record (KEY=VALUE, repeatable)
        #[arg(long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },
    /// List appointments
    List {
        #[arg(long, value_enum, default_value_t = ListView::All)]
        view: ListView,
        /// Number of appointments to show
        #[arg(short, long)]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark an appointment as confirmed
    Confirm {
        /// Record ID or unique ID prefix
        id: String,
    },
    /// Mark an appointment as completed
    Complete {
        /// Record ID or unique ID prefix
        id: String,
    },
    /// Cancel an appointment
    Cancel {
        /// Record ID or unique ID prefix
        id: String,
    },
    /// Show dashboard counts
    Summary {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Follow the appointment list as it changes, until Ctrl-C
    Watch,
    /// Manage the CLI config file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Create or update the config file
    ///
    /// Global `--backend`, `--data-path` and `--seed` values are saved too.
    Init {
        /// Storage key holding the collection
        #[arg(long)]
        storage_key: Option<String>,
        /// Freshness poll interval used by `watch`
        #[arg(long, value_name = "MS")]
        poll_interval_ms: Option<u64>,
    },
    /// Print the effective configuration
    Show,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Single SQLite database file
    #[default]
    Sqlite,
    /// One JSON file per storage key in a directory
    File,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ListView {
    All,
    Upcoming,
    Past,
}
