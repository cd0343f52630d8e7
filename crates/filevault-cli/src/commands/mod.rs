//! CLI command definitions and dispatch.

pub mod check;
pub mod delete;
pub mod files;
pub mod get;
pub mod migrate;
pub mod upload;
pub mod versions;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use filevault_core::config::AppConfig;
use filevault_core::error::AppError;
use filevault_core::traits::BlobStore;
use filevault_core::types::OwnerId;
use filevault_database::{VersionLedger, open_ledger};
use filevault_service::{
    DownloadService, FileService, NameLocks, RequestContext, UploadService, VersionResolver,
};
use filevault_storage::LocalBlobStore;

/// FileVault: versioned, content-addressed file storage
#[derive(Debug, Parser)]
#[command(name = "filevault", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Owner id the file commands act for
    #[arg(long, global = true)]
    pub owner: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Database migration management
    Migrate(migrate::MigrateArgs),
    /// Store a local file as a new version
    Upload(upload::UploadArgs),
    /// Write a stored version to a local file or stdout
    Get(get::GetArgs),
    /// List the versions of a file
    Versions(versions::VersionsArgs),
    /// List all files of the owner
    Files,
    /// Delete a file and every version of it
    Delete(delete::DeleteArgs),
    /// Check ledger and blob store health
    Check,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, config: &AppConfig) -> Result<(), AppError> {
        match &self.command {
            Commands::Migrate(args) => migrate::execute(args, config).await,
            Commands::Check => check::execute(config).await,
            command => {
                let vault = Vault::open(config).await?;
                let ctx = RequestContext::new(parse_owner(self.owner.as_deref())?);
                match command {
                    Commands::Upload(args) => upload::execute(args, &vault, &ctx, self.format).await,
                    Commands::Get(args) => get::execute(args, &vault, &ctx).await,
                    Commands::Versions(args) => {
                        versions::execute(args, &vault, &ctx, self.format).await
                    }
                    Commands::Files => files::execute(&vault, &ctx, self.format).await,
                    Commands::Delete(args) => delete::execute(args, &vault, &ctx).await,
                    Commands::Migrate(_) | Commands::Check => Ok(()),
                }
            }
        }
    }
}

/// The services a file command works with.
pub struct Vault {
    /// Upload orchestrator
    pub uploads: UploadService,
    /// Version download
    pub downloads: DownloadService,
    /// File catalog
    pub files: FileService,
}

impl Vault {
    /// Build every service from configuration.
    pub async fn open(config: &AppConfig) -> Result<Self, AppError> {
        let (ledger, blobs) = open_backends(config).await?;
        let resolver = VersionResolver::new(ledger.clone());
        let locks = NameLocks::new();

        Ok(Self {
            uploads: UploadService::new(
                ledger.clone(),
                blobs.clone(),
                locks.clone(),
                &config.storage,
                &config.versioning,
            ),
            downloads: DownloadService::new(resolver, blobs.clone()),
            files: FileService::new(ledger, blobs, locks),
        })
    }
}

/// Helper: open the configured ledger and blob store
pub async fn open_backends(
    config: &AppConfig,
) -> Result<(Arc<dyn VersionLedger>, Arc<dyn BlobStore>), AppError> {
    let ledger = open_ledger(&config.database).await?;
    let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(&config.storage.root_path).await?);
    Ok((ledger, blobs))
}

/// Helper: parse the `--owner` argument
fn parse_owner(raw: Option<&str>) -> Result<OwnerId, AppError> {
    let raw = raw.ok_or_else(|| AppError::validation("--owner is required for file commands"))?;
    raw.parse()
        .map_err(|e| AppError::validation(format!("Invalid owner id '{raw}': {e}")))
}
