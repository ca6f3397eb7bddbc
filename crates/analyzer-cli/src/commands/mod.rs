//! CLI command definitions and dispatch.

pub mod client;
pub mod job;
pub mod migrate;
pub mod serve;
pub mod token;
pub mod worker;

use clap::{Parser, Subcommand};

use analyzer_core::config::AppConfig;
use analyzer_core::error::AppError;

use crate::output::OutputFormat;

/// Document analyzer: asynchronous analysis of uploaded documents
#[derive(Debug, Parser)]
#[command(name = "analyzer", version, about, long_about = None)]
pub struct Cli {
    /// Directory holding `default.toml` and environment overlays
    #[arg(short, long, default_value = "config")]
    pub config: String,

    /// Environment overlay to apply on top of `default.toml`
    #[arg(short, long, env = "ANALYZER_ENV", default_value = "development")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the HTTP server (with the in-process worker when enabled)
    Serve,
    /// Run or inspect analysis workers
    Worker(worker::WorkerArgs),
    /// Database migration management
    Migrate(migrate::MigrateArgs),
    /// Mint a bearer token for local use
    Token(token::TokenArgs),
    /// Submit and watch analysis jobs through the HTTP API
    Job(job::JobArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::Serve => serve::execute(self.load_config()?).await,
            Commands::Worker(args) => worker::execute(args, self.load_config()?).await,
            Commands::Migrate(args) => migrate::execute(args, self.load_config()?).await,
            Commands::Token(args) => token::execute(args, self.load_config()?, self.format),
            Commands::Job(args) => job::execute(args, self.format).await,
        }
    }

    /// Load configuration from the selected directory and environment.
    fn load_config(&self) -> Result<AppConfig, AppError> {
        AppConfig::load_from(&self.config, &self.env)
            .map_err(|e| AppError::configuration(format!("Failed to load config: {}", e)))
    }
}
