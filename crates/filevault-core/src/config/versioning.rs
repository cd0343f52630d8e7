//! Upload versioning configuration.

use serde::{Deserialize, Serialize};

/// Versioning behaviour of the upload pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersioningConfig {
    /// How many times an upload that lost a write race is retried before
    /// the conflict is returned to the caller.
    #[serde(default = "default_conflict_retries")]
    pub conflict_retries: u32,
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            conflict_retries: default_conflict_retries(),
        }
    }
}

fn default_conflict_retries() -> u32 {
    1
}
