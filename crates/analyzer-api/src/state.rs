//! Application state shared across all handlers and middleware.

use std::sync::Arc;

use analyzer_auth::JwtDecoder;
use analyzer_core::config::AppConfig;
use analyzer_core::traits::{CacheProvider, StorageProvider, WorkQueue};
use analyzer_database::{DocumentStore, JobStore};
use analyzer_service::{AnalysisService, DocumentService, JobDispatcher};

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
/// All fields are `Arc`-wrapped for cheap cloning across tasks.
#[derive(Debug, Clone)]
pub struct AppState {
    // ── Configuration ────────────────────────────────────────
    /// Application configuration
    pub config: Arc<AppConfig>,

    // ── Auth ─────────────────────────────────────────────────
    /// Bearer token validator
    pub jwt_decoder: Arc<JwtDecoder>,

    // ── Services ─────────────────────────────────────────────
    /// Job admission and status
    pub dispatcher: Arc<JobDispatcher>,
    /// Document lifecycle
    pub document_service: Arc<DocumentService>,
    /// Analysis result reads
    pub analysis_service: Arc<AnalysisService>,

    // ── Infrastructure (health and rate limiting) ────────────
    /// Cache provider, also backing the rate-limit counters
    pub cache: Arc<dyn CacheProvider>,
    /// Job record store
    pub jobs: Arc<dyn JobStore>,
    /// Document record store
    pub documents: Arc<dyn DocumentStore>,
    /// Work queue
    pub queue: Arc<dyn WorkQueue>,
    /// Blob store
    pub blobs: Arc<dyn StorageProvider>,
}
