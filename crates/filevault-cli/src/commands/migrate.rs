//! Database migration management commands.

use clap::{Args, Subcommand};

use crate::output;
use filevault_core::config::AppConfig;
use filevault_core::error::AppError;
use filevault_database::LedgerPool;

/// Arguments for the migrate command
#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Migration subcommand
    #[command(subcommand)]
    pub command: MigrateCommand,
}

/// Migration subcommands
#[derive(Debug, Subcommand)]
pub enum MigrateCommand {
    /// Run all pending migrations
    Run,
}

/// Execute migration commands
pub async fn execute(args: &MigrateArgs, config: &AppConfig) -> Result<(), AppError> {
    match &args.command {
        MigrateCommand::Run => {
            if config.database.provider != "postgres" {
                output::print_warning(&format!(
                    "Ledger provider '{}' has no schema to migrate.",
                    config.database.provider
                ));
                return Ok(());
            }

            let pool = LedgerPool::connect(&config.database).await?;
            println!("Running database migrations...");
            filevault_database::migration::run_migrations(pool.pool()).await?;
            pool.close().await;
            output::print_success("All migrations applied successfully.");
        }
    }

    Ok(())
}
