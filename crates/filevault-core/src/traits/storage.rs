//! Blob store trait for pluggable version-content storage backends.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::result::AppResult;
use crate::types::{FileId, FileVersionId};

/// A byte stream type used for reading blob contents.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Immutable content storage addressed by `(file_id, version_id)`.
///
/// The store knows nothing about version metadata. It hands out opaque
/// locators on [`put`](BlobStore::put) and resolves them again on
/// [`fetch`](BlobStore::fetch); the ledger is the only place those
/// locators are recorded.
#[async_trait]
pub trait BlobStore: Send + Sync + std::fmt::Debug + 'static {
    /// Return the backend type name (e.g., "local").
    fn provider_type(&self) -> &str;

    /// Check whether the backend is healthy and reachable.
    async fn health_check(&self) -> AppResult<bool>;

    /// Persist `content` for the given version and return its locator.
    ///
    /// Writing the same identifiers twice replaces the blob in place, so a
    /// retried upload never observes a half-written earlier attempt.
    async fn put(
        &self,
        file_id: FileId,
        version_id: FileVersionId,
        content: Bytes,
        original_name: &str,
    ) -> AppResult<String>;

    /// Open a previously returned locator.
    ///
    /// Returns `Ok(None)` when nothing readable exists at the locator; an
    /// `Err` is reserved for the medium itself failing.
    async fn fetch(&self, location: &str) -> AppResult<Option<ByteStream>>;

    /// Remove every blob stored for a file. Missing data is not an error.
    async fn purge(&self, file_id: FileId) -> AppResult<()>;
}
