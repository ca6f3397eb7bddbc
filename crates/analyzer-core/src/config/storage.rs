//! Blob storage configuration.

use serde::{Deserialize, Serialize};

/// Top-level storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage provider: `"local"` or `"memory"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Root directory for the local provider.
    #[serde(default = "default_root")]
    pub root_path: String,
    /// Maximum upload size in bytes (default 20 MB).
    #[serde(default = "default_max_upload")]
    pub max_upload_size_bytes: u64,
    /// Accepted upload content types.
    #[serde(default = "default_allowed_types")]
    pub allowed_content_types: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            root_path: default_root(),
            max_upload_size_bytes: default_max_upload(),
            allowed_content_types: default_allowed_types(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}

fn default_root() -> String {
    "./data/documents".to_string()
}

fn default_max_upload() -> u64 {
    20 * 1024 * 1024
}

fn default_allowed_types() -> Vec<String> {
    vec![
        "application/pdf".to_string(),
        "text/plain".to_string(),
        "text/markdown".to_string(),
    ]
}
