//! Analysis result handlers.

use axum::Json;
use axum::extract::{Path, Query, State};

use analyzer_core::types::{AnalysisId, DocumentId, PageResponse};
use analyzer_entity::analysis::AnalysisResult;

use crate::dto::request::AnalysisFilterParams;
use crate::dto::response::ApiResponse;
use crate::error::ApiResult;
use crate::extractors::{AuthUser, PaginationParams, parse_id};
use crate::state::AppState;

/// GET /api/analyses?document_id=&page=&page_size=
pub async fn list_analyses(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<PaginationParams>,
    Query(filter): Query<AnalysisFilterParams>,
) -> ApiResult<Json<ApiResponse<PageResponse<AnalysisResult>>>> {
    let document_id = filter
        .document_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| parse_id::<DocumentId>(s, "document"))
        .transpose()?;
    let page = state
        .analysis_service
        .list(&auth, document_id, params.into_page_request())
        .await?;
    Ok(Json(ApiResponse::ok(page)))
}

/// GET /api/analyses/{id}
pub async fn get_analysis(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<AnalysisResult>>> {
    let id: AnalysisId = parse_id(&id, "analysis")?;
    let result = state.analysis_service.get(&auth, id).await?;
    Ok(Json(ApiResponse::ok(result)))
}
