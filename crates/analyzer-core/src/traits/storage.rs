//! Blob store trait for uploaded documents.

use async_trait::async_trait;
use bytes::Bytes;

use crate::result::AppResult;

/// Trait for document blob backends.
///
/// Documents are addressed by an opaque storage path recorded on the
/// document row. Implementations live in `analyzer-storage`.
#[async_trait]
pub trait StorageProvider: Send + Sync + std::fmt::Debug + 'static {
    /// Return the provider type name (e.g., "local", "memory").
    fn provider_type(&self) -> &str;

    /// Check whether the provider is healthy and reachable.
    async fn health_check(&self) -> AppResult<bool>;

    /// Read a blob into memory. Fails with a not-found error if absent.
    async fn read_bytes(&self, path: &str) -> AppResult<Bytes>;

    /// Write bytes to the given path, replacing any existing blob.
    async fn write(&self, path: &str, data: Bytes) -> AppResult<()>;

    /// Delete a blob. Deleting a missing blob is not an error.
    async fn delete(&self, path: &str) -> AppResult<()>;

    /// Check whether a blob exists at the given path.
    async fn exists(&self, path: &str) -> AppResult<bool>;
}
