//! Database migration commands.

use clap::{Args, Subcommand};

use analyzer_core::config::AppConfig;
use analyzer_core::error::AppError;
use analyzer_database::DatabasePool;

use crate::output;

/// Migration arguments
#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Migration subcommand
    #[command(subcommand)]
    pub command: MigrateCommand,
}

/// Migration subcommands
#[derive(Debug, Subcommand)]
pub enum MigrateCommand {
    /// Apply all pending migrations
    Run,
}

/// Execute migration command
pub async fn execute(args: &MigrateArgs, config: AppConfig) -> Result<(), AppError> {
    match args.command {
        MigrateCommand::Run => {
            if config.database.provider != "postgres" {
                output::print_warning(&format!(
                    "Database provider is '{}'; there is nothing to migrate",
                    config.database.provider
                ));
                return Ok(());
            }
            let pool = DatabasePool::connect(&config.database).await?;
            analyzer_database::migration::run_migrations(pool.pool()).await?;
            pool.close().await;
            output::print_success("Migrations applied successfully");
        }
    }
    Ok(())
}
