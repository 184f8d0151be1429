//! Command-line parsing for the `podium-ingest` binary

use podium_core::{ConfigError, IngestConfig, QualificationStatus};
use std::path::PathBuf;

pub const USAGE: &str = "\
Usage: podium-ingest [--config PATH] [COMMAND]

Commands:
  run [--force] [--fresh]   Run the full ingestion if due (default command)
  correct NUMBER STATUS     Overwrite a team's status (world, regional, none)
  status                    Show checkpoint and last full-run time

Without --config, PODIUM_CONFIG names the TOML file; otherwise settings
come from PODIUM_* environment variables.";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CliError {
    #[error("Missing value for {0}")]
    MissingValue(&'static str),
    #[error("Unknown argument: {0}")]
    UnknownArgument(String),
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("Usage requested")]
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run { force: bool, fresh: bool },
    Correct { number: String, status: QualificationStatus },
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cli {
    pub config_path: Option<PathBuf>,
    pub command: Command,
}

impl Cli {
    /// Parse arguments (without the program name).
    pub fn parse<I>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let mut config_path = None;
        let mut positional = Vec::new();
        let mut force = false;
        let mut fresh = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    let path = args.next().ok_or(CliError::MissingValue("--config"))?;
                    config_path = Some(PathBuf::from(path));
                }
                "--force" => force = true,
                "--fresh" => fresh = true,
                "-h" | "--help" => return Err(CliError::Help),
                flag if flag.starts_with("--") => {
                    return Err(CliError::UnknownArgument(flag.to_string()))
                }
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let command = match positional.next().as_deref() {
            None | Some("run") => Command::Run { force, fresh },
            Some("correct") => {
                let number = positional.next().ok_or(CliError::MissingValue("NUMBER"))?;
                let status = positional.next().ok_or(CliError::MissingValue("STATUS"))?;
                Command::Correct {
                    number,
                    status: QualificationStatus::from_admin_label(&status),
                }
            }
            Some("status") => Command::Status,
            Some(other) => return Err(CliError::UnknownCommand(other.to_string())),
        };

        if let Some(extra) = positional.next() {
            return Err(CliError::UnknownArgument(extra));
        }

        Ok(Self {
            config_path,
            command,
        })
    }

    /// Load configuration from `--config`, then `PODIUM_CONFIG`, then the
    /// environment.
    pub fn load_config(&self) -> Result<IngestConfig, ConfigError> {
        let path = self
            .config_path
            .clone()
            .or_else(|| std::env::var("PODIUM_CONFIG").ok().map(PathBuf::from));
        match path {
            Some(path) => IngestConfig::from_path(&path),
            None => Ok(IngestConfig::from_env()),
        }
    }
}
