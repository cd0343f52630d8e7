//! Local filesystem blob store.
//!
//! Blobs live at `<root>/<file_id>/<version_id>[.<ext>]`. Writes go to a
//! temporary sibling first and are renamed into place, so a reader never
//! sees a partially written blob.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};
use uuid::Uuid;

use filevault_core::error::{AppError, ErrorKind};
use filevault_core::result::AppResult;
use filevault_core::traits::storage::{BlobStore, ByteStream};
use filevault_core::types::{FileId, FileVersionId};

/// Longest extension carried over from the original file name.
const MAX_EXTENSION_LEN: usize = 16;

/// Blob store on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    /// Canonical root directory for all blobs.
    root: PathBuf,
}

impl LocalBlobStore {
    /// Create a store rooted at `root_path`, creating the directory if needed.
    pub async fn new(root_path: &str) -> AppResult<Self> {
        let root = PathBuf::from(root_path);
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::StorageUnavailable,
                format!("Failed to create storage root: {}", root.display()),
                e,
            )
        })?;
        let root = fs::canonicalize(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::StorageUnavailable,
                format!("Failed to resolve storage root: {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root })
    }

    /// The canonical root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_dir(&self, file_id: FileId) -> PathBuf {
        self.root.join(file_id.to_string())
    }

    /// Canonicalize `location`, returning `None` if it is missing or escapes the root.
    async fn resolve(&self, location: &str) -> AppResult<Option<PathBuf>> {
        let path = Path::new(location);
        if !path.is_absolute() {
            return Ok(None);
        }
        match fs::canonicalize(path).await {
            Ok(resolved) if resolved.starts_with(&self.root) => Ok(Some(resolved)),
            Ok(resolved) => {
                warn!(location, resolved = %resolved.display(), "Blob locator outside storage root");
                Ok(None)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::with_source(
                ErrorKind::StorageUnavailable,
                format!("Failed to resolve blob: {location}"),
                e,
            )),
        }
    }
}

/// The extension to keep from an uploaded file name, including the dot.
fn blob_extension(original_name: &str) -> String {
    match original_name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            format!(".{}", ext.to_ascii_lowercase())
        }
        _ => String::new(),
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn provider_type(&self) -> &str {
        "local"
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(fs::metadata(&self.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false))
    }

    async fn put(
        &self,
        file_id: FileId,
        version_id: FileVersionId,
        content: Bytes,
        original_name: &str,
    ) -> AppResult<String> {
        let dir = self.file_dir(file_id);
        fs::create_dir_all(&dir).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::StorageUnavailable,
                format!("Failed to create blob directory: {}", dir.display()),
                e,
            )
        })?;

        let name = format!("{version_id}{}", blob_extension(original_name));
        let target = dir.join(&name);
        let staging = dir.join(format!(".{name}.{}.tmp", Uuid::new_v4().simple()));

        let written = async {
            let mut file = fs::File::create(&staging).await?;
            file.write_all(&content).await?;
            file.sync_all().await?;
            fs::rename(&staging, &target).await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&staging).await;
            return Err(AppError::with_source(
                ErrorKind::StorageUnavailable,
                format!("Failed to write blob: {}", target.display()),
                e,
            ));
        }

        debug!(
            file_id = %file_id,
            version_id = %version_id,
            bytes = content.len(),
            "Wrote blob"
        );
        Ok(target.to_string_lossy().into_owned())
    }

    async fn fetch(&self, location: &str) -> AppResult<Option<ByteStream>> {
        let Some(path) = self.resolve(location).await? else {
            return Ok(None);
        };

        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AppError::with_source(
                    ErrorKind::StorageUnavailable,
                    format!("Failed to open blob: {location}"),
                    e,
                ));
            }
        };

        let is_file = file.metadata().await.map(|m| m.is_file()).map_err(|e| {
            AppError::with_source(
                ErrorKind::StorageUnavailable,
                format!("Failed to stat blob: {location}"),
                e,
            )
        })?;
        if !is_file {
            return Ok(None);
        }

        let stream = ReaderStream::new(file);
        Ok(Some(Box::pin(stream.map(|r| r.map(Bytes::from)))))
    }

    async fn purge(&self, file_id: FileId) -> AppResult<()> {
        let dir = self.file_dir(file_id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(file_id = %file_id, "Purged blobs");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::with_source(
                ErrorKind::StorageUnavailable,
                format!("Failed to purge blobs: {}", dir.display()),
                e,
            )),
        }
    }
}
