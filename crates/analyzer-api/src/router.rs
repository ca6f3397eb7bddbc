//! Route definitions for the document analyzer HTTP API.
//!
//! All routes are mounted under `/api`. The router receives `AppState` and
//! passes it to all handlers via Axum's `State` extractor.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};

use crate::handlers;
use crate::middleware::rate_limit::{limit_status_polls, limit_submissions};
use crate::state::AppState;

/// Multipart framing allowance on top of the upload size limit.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the API router. Layers shared by every route are added in
/// [`crate::app::build_app`].
pub fn build_router(state: AppState) -> Router {
    let max_body = state.config.storage.max_upload_size_bytes as usize + MULTIPART_OVERHEAD_BYTES;

    let api_routes = Router::new()
        .merge(job_routes(&state))
        .merge(document_routes().layer(DefaultBodyLimit::max(max_body)))
        .merge(analysis_routes())
        .merge(health_routes());

    Router::new().nest("/api", api_routes).with_state(state)
}

/// Submission and polling, each with its own rate-limit budget.
fn job_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/jobs",
            post(handlers::jobs::submit_job).route_layer(axum_middleware::from_fn_with_state(
                state.clone(),
                limit_submissions,
            )),
        )
        .route(
            "/jobs/{id}",
            get(handlers::jobs::get_job).route_layer(axum_middleware::from_fn_with_state(
                state.clone(),
                limit_status_polls,
            )),
        )
}

/// Document lifecycle
fn document_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/documents",
            get(handlers::documents::list_documents).post(handlers::documents::upload_document),
        )
        .route(
            "/documents/{id}",
            get(handlers::documents::get_document).delete(handlers::documents::delete_document),
        )
}

/// Analysis results
fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/analyses", get(handlers::analyses::list_analyses))
        .route("/analyses/{id}", get(handlers::analyses::get_analysis))
}

/// Health check (unauthenticated)
fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health::health))
}
