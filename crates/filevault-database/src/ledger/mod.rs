//! The version ledger: transactional access to files and their versions.
//!
//! Every mutating call goes through a [`LedgerTransaction`] obtained from
//! [`VersionLedger::begin`]. Nothing staged in a transaction is visible to
//! other callers until [`LedgerTransaction::commit`] succeeds, and dropping
//! a transaction without committing discards all of it.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use filevault_core::config::DatabaseConfig;
use filevault_core::error::AppError;
use filevault_core::result::AppResult;
use filevault_core::types::{FileId, FileVersionId, OwnerId};
use filevault_entity::file::{File, FileVersion, FileWithVersions};

pub use memory::MemoryLedger;
pub use postgres::PgLedger;

/// Read access and transaction factory for the ledger.
#[async_trait]
pub trait VersionLedger: Send + Sync + std::fmt::Debug + 'static {
    /// Return the backend name (e.g., "postgres", "memory").
    fn backend(&self) -> &str;

    /// Check whether the backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;

    /// Start a new transaction.
    async fn begin(&self) -> AppResult<Box<dyn LedgerTransaction>>;

    /// Load a file and all of its versions by owner and name.
    async fn find_file_with_versions(
        &self,
        owner_id: OwnerId,
        file_name: &str,
    ) -> AppResult<Option<FileWithVersions>>;

    /// Load every file of an owner with its versions, ordered by name.
    async fn list_files(&self, owner_id: OwnerId) -> AppResult<Vec<FileWithVersions>>;

    /// Delete a file; its versions go with it. Returns `true` if a row was removed.
    async fn delete_file(&self, file_id: FileId) -> AppResult<bool>;
}

/// One unit of work against the ledger.
#[async_trait]
pub trait LedgerTransaction: Send {
    /// Serialize against every other transaction touching the same
    /// `(owner_id, file_name)` until this transaction ends.
    async fn lock_file_name(&mut self, owner_id: OwnerId, file_name: &str) -> AppResult<()>;

    /// Load a file and its versions as seen by this transaction.
    async fn find_file_with_versions(
        &mut self,
        owner_id: OwnerId,
        file_name: &str,
    ) -> AppResult<Option<FileWithVersions>>;

    /// Create a new file row. Fails with a conflict if the pair exists.
    async fn create_file(&mut self, owner_id: OwnerId, file_name: &str) -> AppResult<File>;

    /// Append a current version to a file.
    ///
    /// `version_number` must be one past the highest existing number.
    /// Without a `location` the row gets a unique pending placeholder.
    async fn append_version(
        &mut self,
        file_id: FileId,
        version_number: i32,
        content_digest: &str,
        location: Option<&str>,
    ) -> AppResult<FileVersion>;

    /// Clear the current flag on every version of a file.
    async fn mark_all_not_current(&mut self, file_id: FileId) -> AppResult<u64>;

    /// Record where a version's blob was written.
    async fn set_storage_location(
        &mut self,
        version_id: FileVersionId,
        location: &str,
    ) -> AppResult<()>;

    /// Make every staged change visible atomically.
    async fn commit(self: Box<Self>) -> AppResult<()>;

    /// Discard every staged change.
    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

/// Check the gap-free numbering contract for a new version.
pub(crate) fn check_next_version_number(
    file_id: FileId,
    latest: i32,
    requested: i32,
) -> AppResult<()> {
    if requested != latest + 1 {
        return Err(AppError::internal(format!(
            "Version {requested} cannot follow version {latest} of file {file_id}"
        )));
    }
    Ok(())
}

/// Open the ledger backend selected by `database.provider`.
pub async fn open_ledger(config: &DatabaseConfig) -> AppResult<Arc<dyn VersionLedger>> {
    let ledger: Arc<dyn VersionLedger> = match config.provider.as_str() {
        "postgres" => {
            info!("Initializing PostgreSQL version ledger");
            let pool = crate::connection::LedgerPool::connect(config).await?;
            if config.run_migrations {
                crate::migration::run_migrations(pool.pool()).await?;
            }
            Arc::new(PgLedger::new(pool.pool().clone()))
        }
        "memory" => {
            info!("Initializing in-memory version ledger");
            Arc::new(MemoryLedger::new())
        }
        other => {
            return Err(AppError::configuration(format!(
                "Unknown ledger provider: '{other}'. Supported: postgres, memory"
            )));
        }
    };

    Ok(ledger)
}
