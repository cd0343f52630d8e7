//! Upload orchestration: hash, dedupe, version, store, commit.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use filevault_core::config::{StorageConfig, VersioningConfig};
use filevault_core::error::{AppError, ErrorKind};
use filevault_core::result::AppResult;
use filevault_core::traits::BlobStore;
use filevault_database::{LedgerTransaction, NameLocks, VersionLedger};
use filevault_entity::file::FileVersion;
use filevault_storage::ContentHasher;

use crate::context::RequestContext;

/// Stores new versions of files.
#[derive(Clone)]
pub struct UploadService {
    /// Version ledger.
    ledger: Arc<dyn VersionLedger>,
    /// Blob store for version content.
    blobs: Arc<dyn BlobStore>,
    /// In-process per-name locks.
    locks: NameLocks,
    /// Content fingerprinting.
    hasher: ContentHasher,
    /// Largest accepted payload.
    max_upload_size_bytes: u64,
    /// Extra attempts after a conflict.
    conflict_retries: u32,
}

impl std::fmt::Debug for UploadService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadService")
            .field("ledger", &self.ledger.backend())
            .field("blobs", &self.blobs.provider_type())
            .finish()
    }
}

impl UploadService {
    /// Creates a new upload service.
    pub fn new(
        ledger: Arc<dyn VersionLedger>,
        blobs: Arc<dyn BlobStore>,
        locks: NameLocks,
        storage: &StorageConfig,
        versioning: &VersioningConfig,
    ) -> Self {
        Self {
            ledger,
            blobs,
            locks,
            hasher: ContentHasher::from_config(storage),
            max_upload_size_bytes: storage.max_upload_size_bytes,
            conflict_retries: versioning.conflict_retries,
        }
    }

    /// Store `content` as the next version of `file_name`.
    ///
    /// Fails with `DuplicateContent` when any existing version of the same
    /// file already has identical bytes.
    pub async fn upload(
        &self,
        ctx: &RequestContext,
        file_name: &str,
        content: Bytes,
    ) -> AppResult<FileVersion> {
        if file_name.trim().is_empty() {
            return Err(AppError::validation("File name must not be empty"));
        }
        if content.len() as u64 > self.max_upload_size_bytes {
            return Err(AppError::validation(format!(
                "File exceeds maximum upload size of {} bytes",
                self.max_upload_size_bytes
            )));
        }

        let digest = self.hasher.digest(&content).await?;

        let mut attempt = 0;
        loop {
            match self.store_version(ctx, file_name, &digest, &content).await {
                Err(e) if e.is(ErrorKind::Conflict) && attempt < self.conflict_retries => {
                    attempt += 1;
                    warn!(
                        request_id = %ctx.request_id,
                        owner_id = %ctx.owner_id,
                        file_name,
                        attempt,
                        error = %e,
                        "Upload lost a write race, retrying"
                    );
                }
                result => return result,
            }
        }
    }

    /// One attempt: everything between taking the name lock and committing.
    async fn store_version(
        &self,
        ctx: &RequestContext,
        file_name: &str,
        digest: &str,
        content: &Bytes,
    ) -> AppResult<FileVersion> {
        let _guard = self.locks.acquire(ctx.owner_id, file_name).await;
        let mut tx = self.ledger.begin().await?;

        match self
            .write_version(tx.as_mut(), ctx, file_name, digest, content)
            .await
        {
            Ok(version) => {
                tx.commit().await?;
                info!(
                    request_id = %ctx.request_id,
                    owner_id = %ctx.owner_id,
                    file_id = %version.file_id,
                    version_id = %version.id,
                    version_number = version.version_number,
                    bytes = content.len(),
                    "File version uploaded"
                );
                Ok(version)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Failed to roll back upload transaction");
                }
                Err(e)
            }
        }
    }

    async fn write_version(
        &self,
        tx: &mut dyn LedgerTransaction,
        ctx: &RequestContext,
        file_name: &str,
        digest: &str,
        content: &Bytes,
    ) -> AppResult<FileVersion> {
        tx.lock_file_name(ctx.owner_id, file_name).await?;

        let (file_id, latest) = match tx.find_file_with_versions(ctx.owner_id, file_name).await? {
            Some(existing) => {
                if let Some(same) = existing.version_with_digest(digest) {
                    debug!(
                        file_id = %existing.file.id,
                        version_number = same.version_number,
                        "Upload matches an existing version"
                    );
                    return Err(AppError::duplicate_content(format!(
                        "File is already saved as version {} of '{file_name}'",
                        same.version_number
                    )));
                }
                (existing.file.id, existing.latest_version_number())
            }
            None => {
                let file = tx.create_file(ctx.owner_id, file_name).await?;
                debug!(file_id = %file.id, file_name, "Created file");
                (file.id, 0)
            }
        };

        tx.mark_all_not_current(file_id).await?;
        let mut version = tx.append_version(file_id, latest + 1, digest, None).await?;

        let location = self
            .blobs
            .put(file_id, version.id, content.clone(), file_name)
            .await?;
        tx.set_storage_location(version.id, &location).await?;
        version.storage_location = location;

        Ok(version)
    }
}
