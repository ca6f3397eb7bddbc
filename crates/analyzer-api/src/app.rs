//! Application builder: wires backends, services, router and middleware
//! into an Axum app, and runs it alongside the analysis worker.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::middleware as axum_middleware;
use tokio::sync::watch;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use analyzer_auth::JwtDecoder;
use analyzer_cache::{CacheInvalidator, CacheManager, ReadThroughCache};
use analyzer_core::config::AppConfig;
use analyzer_core::error::AppError;
use analyzer_core::result::AppResult;
use analyzer_core::traits::{CacheProvider, StorageProvider, WorkQueue};
use analyzer_database::Stores;
use analyzer_service::{AnalysisService, DocumentService, JobDispatcher};
use analyzer_worker::{JobProcessor, PipelineExecutor, WorkerRunner};

use crate::middleware::cors::build_cors_layer;
use crate::middleware::logging::request_logging;
use crate::router::build_router;
use crate::state::AppState;

/// Builds the complete Axum application with all routes and middleware.
pub fn build_app(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.server.cors);
    build_router(state)
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum_middleware::from_fn(request_logging))
}

/// Every external system the server and worker talk to.
#[derive(Debug, Clone)]
pub struct Backends {
    /// Job, analysis and document stores.
    pub stores: Stores,
    /// Raw cache provider (rate-limit counters, health).
    pub cache_provider: Arc<dyn CacheProvider>,
    /// Read-through layer over `cache_provider`.
    pub cache: ReadThroughCache,
    /// Work queue.
    pub queue: Arc<dyn WorkQueue>,
    /// Document blob store.
    pub blobs: Arc<dyn StorageProvider>,
}

impl Backends {
    /// Connect every backend selected by configuration.
    pub async fn connect(config: &AppConfig) -> AppResult<Self> {
        tracing::info!(provider = %config.database.provider, "Connecting job and document stores...");
        let stores = Stores::connect(&config.database).await?;

        tracing::info!(provider = %config.cache.provider, "Initializing cache...");
        let cache_provider: Arc<dyn CacheProvider> =
            Arc::new(CacheManager::new(&config.cache).await?);

        tracing::info!(provider = %config.queue.provider, "Connecting work queue...");
        let queue = analyzer_queue::connect(&config.queue).await?;

        tracing::info!(provider = %config.storage.provider, "Initializing document storage...");
        let blobs = analyzer_storage::connect(&config.storage).await?;

        Ok(Self::from_parts(stores, cache_provider, queue, blobs, config))
    }

    /// Assemble backends from already-built parts.
    pub fn from_parts(
        stores: Stores,
        cache_provider: Arc<dyn CacheProvider>,
        queue: Arc<dyn WorkQueue>,
        blobs: Arc<dyn StorageProvider>,
        config: &AppConfig,
    ) -> Self {
        let cache = ReadThroughCache::new(cache_provider.clone(), &config.cache);
        Self {
            stores,
            cache_provider,
            cache,
            queue,
            blobs,
        }
    }

    /// Release pooled connections.
    pub async fn close(&self) {
        if let Some(pool) = &self.stores.pool {
            pool.close().await;
        }
    }
}

/// Build the shared handler state over the given backends.
pub fn build_state(config: &AppConfig, backends: &Backends) -> AppState {
    let dispatcher = JobDispatcher::new(
        backends.stores.jobs.clone(),
        backends.stores.documents.clone(),
        backends.queue.clone(),
        config.dispatch.clone(),
        config.worker.max_attempts,
    );
    let document_service = DocumentService::new(
        backends.stores.documents.clone(),
        backends.blobs.clone(),
        backends.cache.clone(),
        config.storage.clone(),
    );
    let analysis_service =
        AnalysisService::new(backends.stores.analyses.clone(), backends.cache.clone());

    AppState {
        config: Arc::new(config.clone()),
        jwt_decoder: Arc::new(JwtDecoder::new(&config.auth)),
        dispatcher: Arc::new(dispatcher),
        document_service: Arc::new(document_service),
        analysis_service: Arc::new(analysis_service),
        cache: backends.cache_provider.clone(),
        jobs: backends.stores.jobs.clone(),
        documents: backends.stores.documents.clone(),
        queue: backends.queue.clone(),
        blobs: backends.blobs.clone(),
    }
}

/// Build a worker over the given backends with the configured pipeline.
pub fn build_worker(config: &AppConfig, backends: &Backends) -> AppResult<WorkerRunner> {
    let executor = PipelineExecutor::from_config(&config.worker)?;
    let processor = JobProcessor::new(
        backends.stores.jobs.clone(),
        backends.stores.documents.clone(),
        backends.blobs.clone(),
        backends.queue.clone(),
        CacheInvalidator::new(backends.cache.clone()),
        executor,
        config.worker.clone(),
        WorkerRunner::generate_worker_id(),
    );
    Ok(WorkerRunner::new(processor))
}

/// Runs the HTTP server, plus the in-process worker when enabled, until a
/// shutdown signal arrives.
pub async fn run_server(config: AppConfig) -> AppResult<()> {
    tracing::info!("Starting document analyzer v{}", env!("CARGO_PKG_VERSION"));

    let backends = Backends::connect(&config).await?;
    let state = build_state(&config, &backends);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker_handle = if config.worker.enabled {
        let worker = build_worker(&config, &backends)?;
        tracing::info!(
            steps = ?config.worker.steps,
            concurrency = config.worker.concurrency,
            "Starting in-process analysis worker"
        );
        Some(tokio::spawn(async move { worker.run(shutdown_rx).await }))
    } else {
        tracing::info!("In-process worker disabled");
        None
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;
    tracing::info!("Document analyzer listening on {}", addr);

    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, starting graceful shutdown...");
            let _ = shutdown_tx.send(true);
        })
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

    if let Some(handle) = worker_handle {
        tracing::info!("Waiting for in-flight analysis jobs...");
        let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
        if tokio::time::timeout(grace, handle).await.is_err() {
            tracing::warn!("Worker did not stop within the shutdown grace period");
        }
    }

    backends.close().await;
    tracing::info!("Document analyzer stopped");
    Ok(())
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
