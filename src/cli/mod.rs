//! CLI module for ml-metadata-sync
//!
//! Provides subcommands:
//! - `run`: reconcile local definitions with the platform for one event
//! - `validate`: parse and check local definitions without contacting the platform

pub mod run;
pub mod validate;

use clap::{Parser, Subcommand};

use crate::config::{AppConfig, LogFormat};
use crate::infrastructure::logging::init_logging;

/// ml-metadata-sync - keep custom models and deployments in sync with YAML definitions
#[derive(Parser)]
#[command(name = "ml-metadata-sync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log output format, overrides the configured one
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the action for a push or pull_request event
    Run(run::RunArgs),

    /// Validate local definitions
    Validate(validate::ValidateArgs),
}

/// Loads configuration and installs logging for a subcommand
pub(crate) fn bootstrap(log_format: Option<LogFormat>) -> AppConfig {
    dotenvy::dotenv().ok();

    let mut config = AppConfig::load().unwrap_or_default();
    if let Some(format) = log_format {
        config.logging.format = format;
    }
    init_logging(&config.logging);
    config
}
