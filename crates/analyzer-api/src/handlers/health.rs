//! Health check handler.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::dto::response::{ApiResponse, ComponentHealth, HealthResponse};
use crate::state::AppState;

/// GET /api/health
///
/// `200` when every dependency answers, `503` otherwise. The body lists
/// each component either way.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<ApiResponse<HealthResponse>>) {
    let (job_store, document_store, cache, queue, storage) = tokio::join!(
        state.jobs.health_check(),
        state.documents.health_check(),
        state.cache.health_check(),
        state.queue.health_check(),
        state.blobs.health_check(),
    );
    let components = ComponentHealth {
        job_store: job_store.unwrap_or(false),
        document_store: document_store.unwrap_or(false),
        cache: cache.unwrap_or(false),
        queue: queue.unwrap_or(false),
        storage: storage.unwrap_or(false),
    };

    let (code, status) = if components.all_up() {
        (StatusCode::OK, "ok")
    } else {
        tracing::warn!(?components, "Health check degraded");
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        code,
        Json(ApiResponse::ok(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            components,
        })),
    )
}
