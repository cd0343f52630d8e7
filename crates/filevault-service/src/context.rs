//! Request context carrying the authenticated owner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use filevault_core::types::OwnerId;

/// Context for the current request.
///
/// Authentication happens upstream; services trust `owner_id` as given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// The acting owner.
    pub owner_id: OwnerId,
    /// Correlation id for log lines of this request.
    pub request_id: Uuid,
    /// When the request was received.
    pub request_time: DateTime<Utc>,
}

impl RequestContext {
    /// Creates a context for `owner_id` with a fresh request id.
    pub fn new(owner_id: OwnerId) -> Self {
        Self {
            owner_id,
            request_id: Uuid::new_v4(),
            request_time: Utc::now(),
        }
    }
}
