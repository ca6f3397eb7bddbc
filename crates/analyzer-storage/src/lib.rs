//! # analyzer-storage
//!
//! Blob storage for uploaded documents. The local filesystem provider is
//! the default; the in-memory provider serves tests and throwaway runs.
//! The [`pdf`] module reads text back out of stored PDF blobs.

pub mod pdf;
pub mod providers;

use std::sync::Arc;

use tracing::info;

use analyzer_core::config::storage::StorageConfig;
use analyzer_core::error::AppError;
use analyzer_core::result::AppResult;
use analyzer_core::traits::StorageProvider;
use analyzer_core::types::{DocumentId, UserId};

pub use providers::LocalStorageProvider;
#[cfg(feature = "memory")]
pub use providers::MemoryStorageProvider;

/// Build the configured storage provider.
pub async fn connect(config: &StorageConfig) -> AppResult<Arc<dyn StorageProvider>> {
    match config.provider.as_str() {
        "local" => {
            let provider = LocalStorageProvider::new(&config.root_path).await?;
            info!(root = %config.root_path, "Using local document storage");
            Ok(Arc::new(provider))
        }
        #[cfg(feature = "memory")]
        "memory" => {
            info!("Using in-memory document storage");
            Ok(Arc::new(MemoryStorageProvider::new()))
        }
        other => Err(AppError::configuration(format!(
            "Unsupported storage provider: '{other}'"
        ))),
    }
}

/// Storage path for a document's blob.
pub fn document_path(owner: UserId, document_id: DocumentId) -> String {
    format!("documents/{owner}/{document_id}")
}
