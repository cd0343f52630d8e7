//! File catalog: listing and deleting an owner's files.

use std::sync::Arc;

use tracing::info;

use filevault_core::error::AppError;
use filevault_core::result::AppResult;
use filevault_core::traits::BlobStore;
use filevault_database::{NameLocks, VersionLedger};
use filevault_entity::file::{FileVersion, FileWithVersions};

use crate::context::RequestContext;

/// Read and delete access to an owner's files.
#[derive(Debug, Clone)]
pub struct FileService {
    ledger: Arc<dyn VersionLedger>,
    blobs: Arc<dyn BlobStore>,
    /// Shared with the upload service.
    locks: NameLocks,
}

impl FileService {
    /// Creates a new file service.
    pub fn new(
        ledger: Arc<dyn VersionLedger>,
        blobs: Arc<dyn BlobStore>,
        locks: NameLocks,
    ) -> Self {
        Self {
            ledger,
            blobs,
            locks,
        }
    }

    /// Every file of the caller, ordered by name.
    pub async fn list_files(&self, ctx: &RequestContext) -> AppResult<Vec<FileWithVersions>> {
        self.ledger.list_files(ctx.owner_id).await
    }

    /// All versions of one file, oldest first.
    pub async fn list_versions(
        &self,
        ctx: &RequestContext,
        file_name: &str,
    ) -> AppResult<Vec<FileVersion>> {
        self.ledger
            .find_file_with_versions(ctx.owner_id, file_name)
            .await?
            .map(|f| f.versions)
            .ok_or_else(|| AppError::not_found(format!("File '{file_name}' not found")))
    }

    /// Delete a file with every version, then remove its blobs.
    ///
    /// Waits for any upload in flight on the same name.
    pub async fn delete_file(&self, ctx: &RequestContext, file_name: &str) -> AppResult<()> {
        let _guard = self.locks.acquire(ctx.owner_id, file_name).await;
        let file = self
            .ledger
            .find_file_with_versions(ctx.owner_id, file_name)
            .await?
            .ok_or_else(|| AppError::not_found(format!("File '{file_name}' not found")))?;

        if !self.ledger.delete_file(file.file.id).await? {
            return Err(AppError::not_found(format!("File '{file_name}' not found")));
        }
        self.blobs.purge(file.file.id).await?;

        info!(
            request_id = %ctx.request_id,
            owner_id = %ctx.owner_id,
            file_id = %file.file.id,
            versions = file.versions.len(),
            "File deleted"
        );
        Ok(())
    }
}
