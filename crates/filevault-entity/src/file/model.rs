//! File entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use filevault_core::types::{FileId, OwnerId};

use super::version::FileVersion;

/// A logical file: one per owner and file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct File {
    /// Unique file identifier.
    pub id: FileId,
    /// The owning user.
    pub owner_id: OwnerId,
    /// The user-chosen file name (including extension).
    pub file_name: String,
    /// When the file was first uploaded.
    pub created_at: DateTime<Utc>,
}

/// A file together with its explicitly loaded versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileWithVersions {
    /// The file row.
    #[serde(flatten)]
    pub file: File,
    /// All versions, ordered by ascending `version_number`.
    pub versions: Vec<FileVersion>,
}

impl FileWithVersions {
    /// Assemble a file with its versions, sorting them by version number.
    pub fn new(file: File, mut versions: Vec<FileVersion>) -> Self {
        versions.sort_by_key(|v| v.version_number);
        Self { file, versions }
    }

    /// Highest version number, or 0 when the file has no versions yet.
    pub fn latest_version_number(&self) -> i32 {
        self.versions
            .iter()
            .map(|v| v.version_number)
            .max()
            .unwrap_or(0)
    }

    /// The version of this file whose content has the given digest.
    pub fn version_with_digest(&self, digest: &str) -> Option<&FileVersion> {
        self.versions.iter().find(|v| v.content_digest == digest)
    }

    /// All versions flagged current. More than one means a broken ledger.
    pub fn current_versions(&self) -> Vec<&FileVersion> {
        self.versions.iter().filter(|v| v.is_current).collect()
    }
}
