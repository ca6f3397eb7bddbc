//! In-memory storage provider.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use analyzer_core::error::AppError;
use analyzer_core::result::AppResult;
use analyzer_core::traits::StorageProvider;

/// Blobs held in a concurrent map.
#[derive(Debug, Default)]
pub struct MemoryStorageProvider {
    blobs: DashMap<String, Bytes>,
}

impl MemoryStorageProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Whether no blobs are stored.
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl StorageProvider for MemoryStorageProvider {
    fn provider_type(&self) -> &str {
        "memory"
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }

    async fn read_bytes(&self, path: &str) -> AppResult<Bytes> {
        self.blobs
            .get(path)
            .map(|b| b.value().clone())
            .ok_or_else(|| AppError::not_found(format!("File not found: {path}")))
    }

    async fn write(&self, path: &str, data: Bytes) -> AppResult<()> {
        self.blobs.insert(path.to_string(), data);
        Ok(())
    }

    async fn delete(&self, path: &str) -> AppResult<()> {
        self.blobs.remove(path);
        Ok(())
    }

    async fn exists(&self, path: &str) -> AppResult<bool> {
        Ok(self.blobs.contains_key(path))
    }
}
