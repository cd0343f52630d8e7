//! In-memory version ledger.
//!
//! Transactions stage their writes privately and apply them under the
//! state lock at commit, re-checking the same uniqueness rules the
//! PostgreSQL schema enforces. Per-name locks are held from
//! [`lock_file_name`](LedgerTransaction::lock_file_name) until the
//! transaction ends.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;

use filevault_core::error::AppError;
use filevault_core::result::AppResult;
use filevault_core::types::{FileId, FileVersionId, OwnerId};
use filevault_entity::file::{File, FileVersion, FileWithVersions};

use super::{LedgerTransaction, VersionLedger, check_next_version_number};
use crate::lock::{NameGuard, NameLocks};

/// Committed ledger contents.
#[derive(Debug, Default)]
struct MemoryState {
    files: HashMap<FileId, File>,
    versions: HashMap<FileId, Vec<FileVersion>>,
}

impl MemoryState {
    fn find_file(&self, owner_id: OwnerId, file_name: &str) -> Option<&File> {
        self.files
            .values()
            .find(|f| f.owner_id == owner_id && f.file_name == file_name)
    }
}

/// Ledger kept entirely in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    state: Arc<Mutex<MemoryState>>,
    locks: NameLocks,
}

impl MemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VersionLedger for MemoryLedger {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }

    async fn begin(&self) -> AppResult<Box<dyn LedgerTransaction>> {
        Ok(Box::new(MemoryLedgerTransaction {
            state: Arc::clone(&self.state),
            locks: self.locks.clone(),
            held: Vec::new(),
            new_files: Vec::new(),
            new_versions: Vec::new(),
            cleared: HashSet::new(),
            relocated: HashMap::new(),
        }))
    }

    async fn find_file_with_versions(
        &self,
        owner_id: OwnerId,
        file_name: &str,
    ) -> AppResult<Option<FileWithVersions>> {
        let state = self.state.lock().await;
        Ok(state.find_file(owner_id, file_name).map(|file| {
            let versions = state.versions.get(&file.id).cloned().unwrap_or_default();
            FileWithVersions::new(file.clone(), versions)
        }))
    }

    async fn list_files(&self, owner_id: OwnerId) -> AppResult<Vec<FileWithVersions>> {
        let state = self.state.lock().await;
        let mut files: Vec<FileWithVersions> = state
            .files
            .values()
            .filter(|f| f.owner_id == owner_id)
            .map(|file| {
                let versions = state.versions.get(&file.id).cloned().unwrap_or_default();
                FileWithVersions::new(file.clone(), versions)
            })
            .collect();
        files.sort_by(|a, b| a.file.file_name.cmp(&b.file.file_name));
        Ok(files)
    }

    async fn delete_file(&self, file_id: FileId) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        state.versions.remove(&file_id);
        Ok(state.files.remove(&file_id).is_some())
    }
}

/// A staged unit of work against a [`MemoryLedger`].
pub struct MemoryLedgerTransaction {
    state: Arc<Mutex<MemoryState>>,
    locks: NameLocks,
    held: Vec<NameGuard>,
    new_files: Vec<File>,
    new_versions: Vec<FileVersion>,
    cleared: HashSet<FileId>,
    relocated: HashMap<FileVersionId, String>,
}

impl MemoryLedgerTransaction {
    /// Versions of a file as this transaction sees them.
    fn view_versions(&self, state: &MemoryState, file_id: FileId) -> Vec<FileVersion> {
        let mut versions: Vec<FileVersion> = state
            .versions
            .get(&file_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|mut v| {
                if self.cleared.contains(&file_id) {
                    v.is_current = false;
                }
                if let Some(location) = self.relocated.get(&v.id) {
                    v.storage_location = location.clone();
                }
                v
            })
            .collect();
        versions.extend(
            self.new_versions
                .iter()
                .filter(|v| v.file_id == file_id)
                .cloned(),
        );
        versions
    }

    fn view_file(&self, state: &MemoryState, owner_id: OwnerId, file_name: &str) -> Option<File> {
        state
            .find_file(owner_id, file_name)
            .or_else(|| {
                self.new_files
                    .iter()
                    .find(|f| f.owner_id == owner_id && f.file_name == file_name)
            })
            .cloned()
    }

    fn file_known(&self, state: &MemoryState, file_id: FileId) -> bool {
        state.files.contains_key(&file_id) || self.new_files.iter().any(|f| f.id == file_id)
    }

    /// Apply staged writes to `state`, or leave it untouched on conflict.
    fn apply(&mut self, state: &mut MemoryState) -> AppResult<()> {
        for file in &self.new_files {
            if state.find_file(file.owner_id, &file.file_name).is_some() {
                return Err(AppError::conflict(format!(
                    "File '{}' was created by a concurrent upload",
                    file.file_name
                )));
            }
        }

        let mut touched: HashSet<FileId> = self.cleared.clone();
        touched.extend(self.new_versions.iter().map(|v| v.file_id));
        for version_id in self.relocated.keys() {
            let Some(v) = state.versions.values().flatten().find(|v| v.id == *version_id) else {
                return Err(AppError::conflict(format!(
                    "File version {version_id} was deleted by a concurrent request"
                )));
            };
            touched.insert(v.file_id);
        }

        if let Some(missing) = touched.iter().find(|id| !self.file_known(state, **id)) {
            return Err(AppError::conflict(format!(
                "File {missing} was deleted by a concurrent request"
            )));
        }

        let mut staged: HashMap<FileId, Vec<FileVersion>> = HashMap::new();
        for file_id in &touched {
            staged.insert(*file_id, self.view_versions(state, *file_id));
        }

        for (file_id, versions) in &staged {
            let mut numbers = HashSet::new();
            if !versions.iter().all(|v| numbers.insert(v.version_number)) {
                return Err(AppError::conflict(format!(
                    "Version number of file {file_id} was taken by a concurrent upload"
                )));
            }
            if versions.iter().filter(|v| v.is_current).count() > 1 {
                return Err(AppError::conflict(format!(
                    "File {file_id} would have more than one current version"
                )));
            }
        }

        let mut locations = HashSet::new();
        for version in staged.values().flatten() {
            let others_use_it = state
                .versions
                .iter()
                .filter(|(file_id, _)| !staged.contains_key(file_id))
                .flat_map(|(_, versions)| versions)
                .any(|v| v.storage_location == version.storage_location);
            if others_use_it || !locations.insert(version.storage_location.as_str()) {
                return Err(AppError::conflict(format!(
                    "Storage location {} is already recorded",
                    version.storage_location
                )));
            }
        }

        for file in self.new_files.drain(..) {
            state.files.insert(file.id, file);
        }
        for (file_id, versions) in staged {
            state.versions.insert(file_id, versions);
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerTransaction for MemoryLedgerTransaction {
    async fn lock_file_name(&mut self, owner_id: OwnerId, file_name: &str) -> AppResult<()> {
        if self.held.iter().any(|g| g.covers(owner_id, file_name)) {
            return Ok(());
        }
        let guard = self.locks.acquire(owner_id, file_name).await;
        debug!(owner_id = %owner_id, file_name, "Acquired file name lock");
        self.held.push(guard);
        Ok(())
    }

    async fn find_file_with_versions(
        &mut self,
        owner_id: OwnerId,
        file_name: &str,
    ) -> AppResult<Option<FileWithVersions>> {
        let state = self.state.lock().await;
        Ok(self.view_file(&state, owner_id, file_name).map(|file| {
            let versions = self.view_versions(&state, file.id);
            FileWithVersions::new(file, versions)
        }))
    }

    async fn create_file(&mut self, owner_id: OwnerId, file_name: &str) -> AppResult<File> {
        let state = self.state.lock().await;
        if self.view_file(&state, owner_id, file_name).is_some() {
            return Err(AppError::conflict(format!(
                "File '{file_name}' already exists for this owner"
            )));
        }
        drop(state);

        let file = File {
            id: FileId::new(),
            owner_id,
            file_name: file_name.to_string(),
            created_at: Utc::now(),
        };
        self.new_files.push(file.clone());
        Ok(file)
    }

    async fn append_version(
        &mut self,
        file_id: FileId,
        version_number: i32,
        content_digest: &str,
        location: Option<&str>,
    ) -> AppResult<FileVersion> {
        let state = self.state.lock().await;
        if !self.file_known(&state, file_id) {
            return Err(AppError::internal(format!(
                "Cannot append a version to unknown file {file_id}"
            )));
        }
        let latest = self
            .view_versions(&state, file_id)
            .iter()
            .map(|v| v.version_number)
            .max()
            .unwrap_or(0);
        check_next_version_number(file_id, latest, version_number)?;
        drop(state);

        let id = FileVersionId::new();
        let version = FileVersion {
            id,
            file_id,
            version_number,
            content_digest: content_digest.to_string(),
            storage_location: location
                .map(str::to_string)
                .unwrap_or_else(|| FileVersion::pending_location(id)),
            is_current: true,
            created_at: Utc::now(),
        };
        self.new_versions.push(version.clone());
        Ok(version)
    }

    async fn mark_all_not_current(&mut self, file_id: FileId) -> AppResult<u64> {
        let state = self.state.lock().await;
        let affected = self
            .view_versions(&state, file_id)
            .iter()
            .filter(|v| v.is_current)
            .count() as u64;
        drop(state);

        self.cleared.insert(file_id);
        for version in self.new_versions.iter_mut().filter(|v| v.file_id == file_id) {
            version.is_current = false;
        }
        Ok(affected)
    }

    async fn set_storage_location(
        &mut self,
        version_id: FileVersionId,
        location: &str,
    ) -> AppResult<()> {
        if let Some(version) = self.new_versions.iter_mut().find(|v| v.id == version_id) {
            version.storage_location = location.to_string();
            return Ok(());
        }

        let state = self.state.lock().await;
        if !state.versions.values().flatten().any(|v| v.id == version_id) {
            return Err(AppError::not_found(format!(
                "File version {version_id} not found"
            )));
        }
        drop(state);

        self.relocated.insert(version_id, location.to_string());
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> AppResult<()> {
        let shared = Arc::clone(&self.state);
        let mut state = shared.lock().await;
        self.apply(&mut state)?;
        debug!("Committed in-memory ledger transaction");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use filevault_core::error::ErrorKind;

    use super::*;

    #[tokio::test]
    async fn test_staged_writes_invisible_until_commit() {
        let ledger = MemoryLedger::new();
        let owner = OwnerId::new();

        let mut tx = ledger.begin().await.unwrap();
        let file = tx.create_file(owner, "report.pdf").await.unwrap();
        tx.append_version(file.id, 1, "aaa", None).await.unwrap();

        assert!(
            tx.find_file_with_versions(owner, "report.pdf")
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            ledger
                .find_file_with_versions(owner, "report.pdf")
                .await
                .unwrap()
                .is_none()
        );

        tx.commit().await.unwrap();
        let loaded = ledger
            .find_file_with_versions(owner, "report.pdf")
            .await
            .unwrap()
            .expect("committed");
        assert_eq!(loaded.versions.len(), 1);
        assert!(loaded.versions[0].is_pending());
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let ledger = MemoryLedger::new();
        let owner = OwnerId::new();
        {
            let mut tx = ledger.begin().await.unwrap();
            tx.create_file(owner, "gone.txt").await.unwrap();
        }
        assert!(ledger.list_files(owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mark_not_current_then_append() {
        let ledger = MemoryLedger::new();
        let owner = OwnerId::new();

        let mut tx = ledger.begin().await.unwrap();
        let file = tx.create_file(owner, "a.txt").await.unwrap();
        tx.append_version(file.id, 1, "d1", Some("/b/1")).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = ledger.begin().await.unwrap();
        assert_eq!(tx.mark_all_not_current(file.id).await.unwrap(), 1);
        let v2 = tx.append_version(file.id, 2, "d2", None).await.unwrap();
        tx.set_storage_location(v2.id, "/b/2").await.unwrap();
        tx.commit().await.unwrap();

        let loaded = ledger
            .find_file_with_versions(owner, "a.txt")
            .await
            .unwrap()
            .unwrap();
        let current: Vec<i32> = loaded
            .current_versions()
            .iter()
            .map(|v| v.version_number)
            .collect();
        assert_eq!(current, vec![2]);
        assert_eq!(loaded.versions[1].storage_location, "/b/2");
    }

    #[tokio::test]
    async fn test_version_gap_is_contract_error() {
        let ledger = MemoryLedger::new();
        let mut tx = ledger.begin().await.unwrap();
        let file = tx.create_file(OwnerId::new(), "x").await.unwrap();
        let err = tx
            .append_version(file.id, 2, "d", None)
            .await
            .expect_err("gap");
        assert_eq!(err.kind, ErrorKind::Internal);
    }

    #[tokio::test]
    async fn test_racing_creators_first_commit_wins() {
        let ledger = MemoryLedger::new();
        let owner = OwnerId::new();

        let mut first = ledger.begin().await.unwrap();
        let mut second = ledger.begin().await.unwrap();
        let f1 = first.create_file(owner, "same.txt").await.unwrap();
        let f2 = second.create_file(owner, "same.txt").await.unwrap();
        first.append_version(f1.id, 1, "a", None).await.unwrap();
        second.append_version(f2.id, 1, "b", None).await.unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.expect_err("loser");
        assert_eq!(err.kind, ErrorKind::Conflict);

        let files = ledger.list_files(owner).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].versions[0].content_digest, "a");
    }

    #[tokio::test]
    async fn test_racing_versions_first_commit_wins() {
        let ledger = MemoryLedger::new();
        let owner = OwnerId::new();
        let mut tx = ledger.begin().await.unwrap();
        let file = tx.create_file(owner, "doc").await.unwrap();
        tx.append_version(file.id, 1, "a", None).await.unwrap();
        tx.commit().await.unwrap();

        let mut first = ledger.begin().await.unwrap();
        let mut second = ledger.begin().await.unwrap();
        for tx in [&mut first, &mut second] {
            tx.mark_all_not_current(file.id).await.unwrap();
        }
        first.append_version(file.id, 2, "b", None).await.unwrap();
        second.append_version(file.id, 2, "c", None).await.unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.expect_err("loser");
        assert_eq!(err.kind, ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_name_lock_serializes_transactions() {
        let ledger = MemoryLedger::new();
        let owner = OwnerId::new();

        let mut holder = ledger.begin().await.unwrap();
        holder.lock_file_name(owner, "locked").await.unwrap();

        let contender = {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                let mut tx = ledger.begin().await.unwrap();
                tx.lock_file_name(owner, "locked").await.unwrap();
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        holder.rollback().await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("lock released")
            .unwrap();
        assert_eq!(ledger.locks.in_use(), 0);
    }

    #[tokio::test]
    async fn test_delete_file_removes_versions() {
        let ledger = MemoryLedger::new();
        let owner = OwnerId::new();
        let mut tx = ledger.begin().await.unwrap();
        let file = tx.create_file(owner, "del").await.unwrap();
        tx.append_version(file.id, 1, "a", None).await.unwrap();
        tx.commit().await.unwrap();

        assert!(ledger.delete_file(file.id).await.unwrap());
        assert!(!ledger.delete_file(file.id).await.unwrap());
        assert!(ledger.list_files(owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_after_file_deleted_conflicts() {
        let ledger = MemoryLedger::new();
        let owner = OwnerId::new();
        let mut tx = ledger.begin().await.unwrap();
        let file = tx.create_file(owner, "doc").await.unwrap();
        let v1 = tx.append_version(file.id, 1, "a", Some("/b/1")).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = ledger.begin().await.unwrap();
        tx.mark_all_not_current(file.id).await.unwrap();
        tx.append_version(file.id, 2, "b", None).await.unwrap();
        assert!(ledger.delete_file(file.id).await.unwrap());

        let err = tx.commit().await.expect_err("file is gone");
        assert_eq!(err.kind, ErrorKind::Conflict);
        assert!(ledger.list_files(owner).await.unwrap().is_empty());
        assert!(ledger.state.lock().await.versions.is_empty());

        let err = ledger
            .begin()
            .await
            .unwrap()
            .set_storage_location(v1.id, "/b/1-moved")
            .await
            .expect_err("version deleted before staging");
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_relocation_after_file_deleted_conflicts() {
        let ledger = MemoryLedger::new();
        let owner = OwnerId::new();
        let mut tx = ledger.begin().await.unwrap();
        let file = tx.create_file(owner, "doc").await.unwrap();
        let v1 = tx.append_version(file.id, 1, "a", None).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = ledger.begin().await.unwrap();
        tx.set_storage_location(v1.id, "/b/1").await.unwrap();
        ledger.delete_file(file.id).await.unwrap();

        let err = tx.commit().await.expect_err("file is gone");
        assert_eq!(err.kind, ErrorKind::Conflict);
        assert!(ledger.state.lock().await.versions.is_empty());
    }
}
