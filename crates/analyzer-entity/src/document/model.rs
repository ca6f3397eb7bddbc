//! Document entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use analyzer_core::types::{DocumentId, UserId};

/// An uploaded document and the handle of its blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Document {
    /// Unique document identifier.
    pub id: DocumentId,
    /// Owning user.
    pub owner_id: UserId,
    /// Original file name as uploaded.
    pub filename: String,
    /// Declared content type.
    pub content_type: String,
    /// Size of the blob in bytes.
    pub size_bytes: i64,
    /// Blob store path.
    pub storage_path: String,
    /// When the document was uploaded.
    pub created_at: DateTime<Utc>,
}

/// Data required to record an uploaded document.
#[derive(Debug, Clone)]
pub struct NewDocument {
    /// Pre-allocated identifier, also used in the storage path.
    pub id: DocumentId,
    /// Owning user.
    pub owner_id: UserId,
    /// Original file name.
    pub filename: String,
    /// Declared content type.
    pub content_type: String,
    /// Size of the blob in bytes.
    pub size_bytes: i64,
    /// Blob store path.
    pub storage_path: String,
}

impl Document {
    /// Whether the given user owns this document.
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.owner_id == user_id
    }
}
