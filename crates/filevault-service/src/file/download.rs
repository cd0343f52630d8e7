//! Download service: resolve a version and stream its content.

use std::sync::Arc;

use tracing::{debug, warn};

use filevault_core::error::AppError;
use filevault_core::result::AppResult;
use filevault_core::traits::{BlobStore, ByteStream};
use filevault_entity::file::FileVersion;

use super::resolver::VersionResolver;
use crate::context::RequestContext;

/// A resolved version together with its content stream.
pub struct VersionContent {
    /// The requested file name.
    pub file_name: String,
    /// The version that was resolved.
    pub version: FileVersion,
    /// Blob content.
    pub stream: ByteStream,
}

impl std::fmt::Debug for VersionContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionContent")
            .field("file_name", &self.file_name)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Opens stored versions for reading.
#[derive(Debug, Clone)]
pub struct DownloadService {
    resolver: VersionResolver,
    blobs: Arc<dyn BlobStore>,
}

impl DownloadService {
    /// Creates a new download service.
    pub fn new(resolver: VersionResolver, blobs: Arc<dyn BlobStore>) -> Self {
        Self { resolver, blobs }
    }

    /// Open `file_name` at `version_id`, or at its current version.
    pub async fn open(
        &self,
        ctx: &RequestContext,
        file_name: &str,
        version_id: Option<&str>,
    ) -> AppResult<VersionContent> {
        let version = self
            .resolver
            .resolve(ctx.owner_id, file_name, version_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("File '{file_name}' not found")))?;

        let Some(stream) = self.blobs.fetch(&version.storage_location).await? else {
            warn!(
                request_id = %ctx.request_id,
                file_id = %version.file_id,
                version_id = %version.id,
                location = %version.storage_location,
                "Ledger points at a missing blob"
            );
            return Err(AppError::storage_unavailable(format!(
                "Content of version {} of '{file_name}' is unavailable",
                version.version_number
            )));
        };

        debug!(
            request_id = %ctx.request_id,
            version_id = %version.id,
            version_number = version.version_number,
            "Opened file version"
        );
        Ok(VersionContent {
            file_name: file_name.to_string(),
            version,
            stream,
        })
    }
}
