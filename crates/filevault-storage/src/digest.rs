//! Content hashing.

use bytes::Bytes;
use sha2::{Digest, Sha256};
use tracing::debug;

use filevault_core::config::StorageConfig;
use filevault_core::error::AppError;
use filevault_core::result::AppResult;

/// Hex-encoded SHA-256 of `content` (64 lowercase characters).
pub fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Computes content fingerprints, moving large payloads off the async workers.
#[derive(Debug, Clone, Copy)]
pub struct ContentHasher {
    offload_threshold: usize,
}

impl ContentHasher {
    /// Create a hasher that offloads payloads of at least `offload_threshold` bytes.
    pub fn new(offload_threshold: usize) -> Self {
        Self { offload_threshold }
    }

    /// Create a hasher from the storage configuration.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(usize::try_from(config.hash_offload_threshold_bytes).unwrap_or(usize::MAX))
    }

    /// Fingerprint `content`.
    pub async fn digest(&self, content: &Bytes) -> AppResult<String> {
        if content.len() < self.offload_threshold {
            return Ok(sha256_hex(content));
        }

        debug!(bytes = content.len(), "Hashing on blocking pool");
        let content = content.clone();
        tokio::task::spawn_blocking(move || sha256_hex(&content))
            .await
            .map_err(|e| AppError::internal(format!("Hashing task failed: {e}")))
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::from_config(&StorageConfig::default())
    }
}
