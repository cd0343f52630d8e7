//! # filevault-storage
//!
//! Content hashing and the local filesystem blob store for FileVault.

pub mod digest;
pub mod local;

pub use digest::{ContentHasher, sha256_hex};
pub use local::LocalBlobStore;
