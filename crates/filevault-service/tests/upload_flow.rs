//! End-to-end upload and read flows on the in-memory ledger.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::TryStreamExt;
use tempfile::TempDir;

use filevault_core::config::{StorageConfig, VersioningConfig};
use filevault_core::error::ErrorKind;
use filevault_core::traits::BlobStore;
use filevault_core::types::{FileVersionId, OwnerId};
use filevault_database::{MemoryLedger, VersionLedger};
use filevault_service::{
    DownloadService, FileService, NameLocks, RequestContext, UploadService, VersionContent,
    VersionResolver,
};
use filevault_storage::{LocalBlobStore, sha256_hex};

/// All services wired over one ledger and one temporary blob root.
struct TestVault {
    _root: TempDir,
    uploads: UploadService,
    resolver: VersionResolver,
    downloads: DownloadService,
    files: FileService,
    locks: NameLocks,
}

impl TestVault {
    async fn new() -> Self {
        let root = tempfile::tempdir().expect("temp dir");
        let ledger: Arc<dyn VersionLedger> = Arc::new(MemoryLedger::new());
        let blobs: Arc<dyn BlobStore> = Arc::new(
            LocalBlobStore::new(root.path().to_str().expect("utf-8 path"))
                .await
                .expect("blob store"),
        );

        let resolver = VersionResolver::new(ledger.clone());
        let locks = NameLocks::new();
        Self {
            _root: root,
            uploads: UploadService::new(
                ledger.clone(),
                blobs.clone(),
                locks.clone(),
                &StorageConfig::default(),
                &VersioningConfig::default(),
            ),
            downloads: DownloadService::new(resolver.clone(), blobs.clone()),
            files: FileService::new(ledger, blobs, locks.clone()),
            resolver,
            locks,
        }
    }
}

async fn read(content: VersionContent) -> Vec<u8> {
    let chunks: Vec<Bytes> = content.stream.try_collect().await.expect("read blob");
    chunks.concat()
}

#[tokio::test]
async fn report_pdf_scenario() {
    let vault = TestVault::new().await;
    let ctx = RequestContext::new(OwnerId::new());

    let v1 = vault
        .uploads
        .upload(&ctx, "report.pdf", Bytes::from_static(b"A"))
        .await
        .unwrap();
    assert_eq!(v1.version_number, 1);
    assert!(v1.is_current);
    assert_eq!(v1.content_digest, sha256_hex(b"A"));

    let v2 = vault
        .uploads
        .upload(&ctx, "report.pdf", Bytes::from_static(b"B"))
        .await
        .unwrap();
    assert_eq!(v2.version_number, 2);

    let versions = vault.files.list_versions(&ctx, "report.pdf").await.unwrap();
    assert_eq!(versions.len(), 2);
    assert!(!versions[0].is_current);
    assert!(versions[1].is_current);

    let err = vault
        .uploads
        .upload(&ctx, "report.pdf", Bytes::from_static(b"A"))
        .await
        .expect_err("duplicate");
    assert_eq!(err.kind, ErrorKind::DuplicateContent);
    assert_eq!(
        vault.files.list_versions(&ctx, "report.pdf").await.unwrap().len(),
        2
    );

    let latest = vault.downloads.open(&ctx, "report.pdf", None).await.unwrap();
    assert_eq!(latest.version.id, v2.id);
    assert_eq!(read(latest).await, b"B");

    let old = vault
        .downloads
        .open(&ctx, "report.pdf", Some(&v1.id.to_string()))
        .await
        .unwrap();
    assert_eq!(read(old).await, b"A");
}

#[tokio::test]
async fn sequential_uploads_number_from_one() {
    let vault = TestVault::new().await;
    let ctx = RequestContext::new(OwnerId::new());

    for n in 1..=5u8 {
        let version = vault
            .uploads
            .upload(&ctx, "log.txt", Bytes::from(vec![n; n as usize]))
            .await
            .unwrap();
        assert_eq!(version.version_number, i32::from(n));
    }

    let versions = vault.files.list_versions(&ctx, "log.txt").await.unwrap();
    let numbers: Vec<i32> = versions.iter().map(|v| v.version_number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    let current: Vec<i32> = versions
        .iter()
        .filter(|v| v.is_current)
        .map(|v| v.version_number)
        .collect();
    assert_eq!(current, vec![5]);
}

#[tokio::test]
async fn same_bytes_under_two_names_are_independent() {
    let vault = TestVault::new().await;
    let ctx = RequestContext::new(OwnerId::new());
    let content = Bytes::from_static(b"shared");

    let a = vault.uploads.upload(&ctx, "a.txt", content.clone()).await.unwrap();
    let b = vault.uploads.upload(&ctx, "b.txt", content).await.unwrap();

    assert_eq!(a.content_digest, b.content_digest);
    assert_ne!(a.file_id, b.file_id);
    assert_ne!(a.storage_location, b.storage_location);
    assert_eq!(b.version_number, 1);
}

#[tokio::test]
async fn owners_do_not_share_files() {
    let vault = TestVault::new().await;
    let alice = RequestContext::new(OwnerId::new());
    let bob = RequestContext::new(OwnerId::new());

    vault
        .uploads
        .upload(&alice, "notes.md", Bytes::from_static(b"alice"))
        .await
        .unwrap();
    let bobs = vault
        .uploads
        .upload(&bob, "notes.md", Bytes::from_static(b"alice"))
        .await
        .unwrap();
    assert_eq!(bobs.version_number, 1);

    let err = vault
        .downloads
        .open(&RequestContext::new(OwnerId::new()), "notes.md", None)
        .await
        .expect_err("stranger");
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn empty_content_is_a_valid_version() {
    let vault = TestVault::new().await;
    let ctx = RequestContext::new(OwnerId::new());

    let version = vault
        .uploads
        .upload(&ctx, "empty", Bytes::new())
        .await
        .unwrap();
    assert_eq!(version.content_digest, sha256_hex(b""));

    let opened = vault.downloads.open(&ctx, "empty", None).await.unwrap();
    assert!(read(opened).await.is_empty());
}

#[tokio::test]
async fn resolver_falls_back_to_current() {
    let vault = TestVault::new().await;
    let ctx = RequestContext::new(OwnerId::new());

    let v1 = vault
        .uploads
        .upload(&ctx, "doc", Bytes::from_static(b"1"))
        .await
        .unwrap();
    let v2 = vault
        .uploads
        .upload(&ctx, "doc", Bytes::from_static(b"2"))
        .await
        .unwrap();

    let resolve = |id: Option<String>| {
        let resolver = vault.resolver.clone();
        let owner = ctx.owner_id;
        async move { resolver.resolve(owner, "doc", id.as_deref()).await.unwrap() }
    };

    assert_eq!(resolve(Some(v1.id.to_string())).await.unwrap().id, v1.id);
    assert_eq!(resolve(None).await.unwrap().id, v2.id);
    assert_eq!(resolve(Some("garbage".into())).await.unwrap().id, v2.id);
    assert_eq!(
        resolve(Some(FileVersionId::new().to_string()))
            .await
            .unwrap()
            .id,
        v2.id
    );

    assert!(
        vault
            .resolver
            .resolve(ctx.owner_id, "missing", None)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_uploads_never_share_a_version_number() {
    let vault = Arc::new(TestVault::new().await);
    let ctx = RequestContext::new(OwnerId::new());

    let handles: Vec<_> = (0..8u8)
        .map(|i| {
            let vault = Arc::clone(&vault);
            let ctx = ctx.clone();
            tokio::spawn(async move {
                vault
                    .uploads
                    .upload(&ctx, "race.bin", Bytes::from(vec![i; 32]))
                    .await
            })
        })
        .collect();

    let mut numbers = HashSet::new();
    for handle in handles {
        let version = handle.await.unwrap().expect("distinct content uploads");
        assert!(numbers.insert(version.version_number));
    }
    assert_eq!(numbers, (1..=8).collect::<HashSet<i32>>());

    let versions = vault.files.list_versions(&ctx, "race.bin").await.unwrap();
    assert_eq!(versions.iter().filter(|v| v.is_current).count(), 1);
    assert_eq!(versions.last().map(|v| v.is_current), Some(true));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_identical_uploads_store_once() {
    let vault = Arc::new(TestVault::new().await);
    let ctx = RequestContext::new(OwnerId::new());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let vault = Arc::clone(&vault);
            let ctx = ctx.clone();
            tokio::spawn(async move {
                vault
                    .uploads
                    .upload(&ctx, "same.bin", Bytes::from_static(b"identical"))
                    .await
            })
        })
        .collect();

    let mut stored = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => stored += 1,
            Err(e) => assert_eq!(e.kind, ErrorKind::DuplicateContent),
        }
    }
    assert_eq!(stored, 1);
}

#[tokio::test]
async fn catalog_lists_and_deletes() {
    let vault = TestVault::new().await;
    let ctx = RequestContext::new(OwnerId::new());

    for name in ["b.txt", "a.txt"] {
        vault
            .uploads
            .upload(&ctx, name, Bytes::from(name.as_bytes().to_vec()))
            .await
            .unwrap();
    }

    let names: Vec<String> = vault
        .files
        .list_files(&ctx)
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.file.file_name)
        .collect();
    assert_eq!(names, vec!["a.txt", "b.txt"]);

    let location = vault.files.list_versions(&ctx, "a.txt").await.unwrap()[0]
        .storage_location
        .clone();
    vault.files.delete_file(&ctx, "a.txt").await.unwrap();
    assert!(!std::path::Path::new(&location).exists());

    let err = vault
        .files
        .list_versions(&ctx, "a.txt")
        .await
        .expect_err("deleted");
    assert_eq!(err.kind, ErrorKind::NotFound);
    let err = vault
        .files
        .delete_file(&ctx, "a.txt")
        .await
        .expect_err("already deleted");
    assert_eq!(err.kind, ErrorKind::NotFound);

    let again = vault
        .uploads
        .upload(&ctx, "a.txt", Bytes::from_static(b"a.txt"))
        .await
        .unwrap();
    assert_eq!(again.version_number, 1);
}

#[tokio::test]
async fn missing_blob_is_storage_unavailable() {
    let vault = TestVault::new().await;
    let ctx = RequestContext::new(OwnerId::new());

    let version = vault
        .uploads
        .upload(&ctx, "gone.txt", Bytes::from_static(b"bytes"))
        .await
        .unwrap();
    std::fs::remove_file(&version.storage_location).unwrap();

    let err = vault
        .downloads
        .open(&ctx, "gone.txt", None)
        .await
        .expect_err("blob removed");
    assert_eq!(err.kind, ErrorKind::StorageUnavailable);
}

#[tokio::test]
async fn delete_waits_for_upload_on_same_name() {
    let vault = Arc::new(TestVault::new().await);
    let ctx = RequestContext::new(OwnerId::new());
    vault
        .uploads
        .upload(&ctx, "busy.txt", Bytes::from_static(b"v1"))
        .await
        .unwrap();

    let in_flight = vault.locks.acquire(ctx.owner_id, "busy.txt").await;
    let delete = {
        let vault = Arc::clone(&vault);
        let ctx = ctx.clone();
        tokio::spawn(async move { vault.files.delete_file(&ctx, "busy.txt").await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!delete.is_finished());
    assert_eq!(
        vault.files.list_versions(&ctx, "busy.txt").await.unwrap().len(),
        1
    );

    drop(in_flight);
    tokio::time::timeout(Duration::from_secs(1), delete)
        .await
        .expect("delete proceeds once the name is free")
        .unwrap()
        .unwrap();
    let err = vault
        .files
        .list_versions(&ctx, "busy.txt")
        .await
        .expect_err("deleted");
    assert_eq!(err.kind, ErrorKind::NotFound);
}
