//! Version resolution: which version a read request refers to.

use std::sync::Arc;

use tracing::error;

use filevault_core::result::AppResult;
use filevault_core::types::{FileVersionId, OwnerId};
use filevault_database::VersionLedger;
use filevault_entity::file::{FileVersion, FileWithVersions};

/// Maps `(owner_id, file_name, version_id?)` to a concrete version.
#[derive(Debug, Clone)]
pub struct VersionResolver {
    ledger: Arc<dyn VersionLedger>,
}

impl VersionResolver {
    /// Creates a resolver over the given ledger.
    pub fn new(ledger: Arc<dyn VersionLedger>) -> Self {
        Self { ledger }
    }

    /// Resolve a version of a file.
    ///
    /// Returns `None` only when the file does not exist or has no versions.
    pub async fn resolve(
        &self,
        owner_id: OwnerId,
        file_name: &str,
        version_id: Option<&str>,
    ) -> AppResult<Option<FileVersion>> {
        let Some(file) = self
            .ledger
            .find_file_with_versions(owner_id, file_name)
            .await?
        else {
            return Ok(None);
        };
        Ok(select_version(&file, version_id).cloned())
    }
}

/// Pick the requested version of `file`, falling back to the current one.
///
/// A `version_id` that does not parse or does not belong to this file is
/// treated as absent.
pub fn select_version<'a>(
    file: &'a FileWithVersions,
    version_id: Option<&str>,
) -> Option<&'a FileVersion> {
    let requested = version_id
        .and_then(|raw| raw.trim().parse::<FileVersionId>().ok())
        .and_then(|id| file.versions.iter().find(|v| v.id == id));
    if requested.is_some() {
        return requested;
    }

    let current = file.current_versions();
    if current.len() > 1 {
        error!(
            file_id = %file.file.id,
            current = current.len(),
            "File has more than one current version"
        );
    }
    current.into_iter().min_by_key(|v| v.version_number)
}
