//! File version entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use filevault_core::types::{FileId, FileVersionId};

/// Locator prefix given to a version row before its blob is written.
pub const PENDING_LOCATION_PREFIX: &str = "pending:";

/// One stored content revision of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct FileVersion {
    /// Unique version identifier.
    pub id: FileVersionId,
    /// The file this version belongs to.
    pub file_id: FileId,
    /// Sequential version number, starting at 1.
    pub version_number: i32,
    /// Hex SHA-256 digest of the content.
    pub content_digest: String,
    /// Blob store locator for the content.
    pub storage_location: String,
    /// Whether this is the version served by default.
    pub is_current: bool,
    /// When this version was created.
    pub created_at: DateTime<Utc>,
}

impl FileVersion {
    /// Placeholder locator for a version whose blob has not been written.
    pub fn pending_location(id: FileVersionId) -> String {
        format!("{PENDING_LOCATION_PREFIX}{id}")
    }

    /// Whether the blob for this version was never recorded.
    pub fn is_pending(&self) -> bool {
        self.storage_location.starts_with(PENDING_LOCATION_PREFIX)
    }
}
