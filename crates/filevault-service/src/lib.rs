//! # filevault-service
//!
//! Service layer for FileVault. The upload orchestrator, version resolver,
//! download service and file catalog are built from a [`VersionLedger`] and
//! a [`BlobStore`] passed in as `Arc`s at construction time.
//!
//! [`VersionLedger`]: filevault_database::VersionLedger
//! [`BlobStore`]: filevault_core::traits::BlobStore

pub mod context;
pub mod file;

pub use context::RequestContext;
pub use file::{DownloadService, FileService, UploadService, VersionContent, VersionResolver};
pub use filevault_database::NameLocks;
