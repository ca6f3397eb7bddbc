//! Job submission and status handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use analyzer_core::types::{DocumentId, JobId};
use analyzer_entity::job::JobSnapshot;
use analyzer_service::JobHandle;

use crate::dto::request::SubmitJobRequest;
use crate::dto::response::ApiResponse;
use crate::error::ApiResult;
use crate::extractors::{ApiJson, AuthUser, parse_id};
use crate::state::AppState;

/// POST /api/jobs
///
/// Returns `202 Accepted` once the job is recorded and queued.
pub async fn submit_job(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<SubmitJobRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<JobHandle>>)> {
    let document_id: DocumentId = parse_id(&req.document_id, "document")?;
    let handle = state.dispatcher.submit(&auth, document_id, req.query).await?;
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::ok(handle))))
}

/// GET /api/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<JobSnapshot>>> {
    let job_id: JobId = parse_id(&id, "job")?;
    let snapshot = state.dispatcher.get_status(&auth, job_id).await?;
    Ok(Json(ApiResponse::ok(snapshot)))
}
