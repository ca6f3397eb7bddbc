//! Response DTOs.

use serde::{Deserialize, Serialize};

/// Standard success response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Simple message response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Message.
    pub message: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `"ok"` when every dependency answered, otherwise `"degraded"`.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Per-dependency reachability.
    pub components: ComponentHealth,
}

/// Reachability of each backing service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Job record store.
    pub job_store: bool,
    /// Document record store.
    pub document_store: bool,
    /// Cache provider.
    pub cache: bool,
    /// Work queue broker.
    pub queue: bool,
    /// Blob store.
    pub storage: bool,
}

impl ComponentHealth {
    /// Whether every component is reachable.
    pub fn all_up(&self) -> bool {
        self.job_store && self.document_store && self.cache && self.queue && self.storage
    }
}
