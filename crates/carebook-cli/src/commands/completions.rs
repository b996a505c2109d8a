use std::io::{self, Write};
use std::path::Path;

use clap::CommandFactory;
use clap_complete::{generate, Shell};
use tempfile::NamedTempFile;

use crate::cli::Cli;
use crate::error::CliError;

/// Print the completion script for `shell`, or write it to `output_path`.
pub fn run_completions(shell: Shell, output_path: Option<&Path>) -> Result<(), CliError> {
    match output_path {
        Some(path) => {
            install_completions(shell, path)?;
            println!("{}", path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            write_completions(shell, &mut stdout);
            stdout.flush()?;
        }
    }
    Ok(())
}

pub fn write_completions(shell: Shell, out: &mut dyn Write) {
    let mut command = Cli::command();
    let bin_name = command.get_name().to_string();
    generate(shell, &mut command, bin_name, out);
}

/// Stage the script next to `path` and persist it over the target, so an
/// interrupted run never leaves a truncated script behind.
fn install_completions(shell: Shell, path: &Path) -> Result<(), CliError> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut staged = NamedTempFile::new_in(dir)?;
    write_completions(shell, &mut staged);
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|error| error.error)?;

    tracing::debug!(%shell, path = %path.display(), "Installed completion script");
    Ok(())
}
