//! Document upload, listing, retrieval and deletion handlers.

use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use bytes::Bytes;

use analyzer_core::error::AppError;
use analyzer_core::types::{DocumentId, PageResponse};
use analyzer_entity::document::Document;
use analyzer_service::UploadDocument;

use crate::dto::response::{ApiResponse, MessageResponse};
use crate::error::ApiResult;
use crate::extractors::{AuthUser, PaginationParams, parse_id};
use crate::state::AppState;

/// GET /api/documents
pub async fn list_documents(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<PaginationParams>,
) -> ApiResult<Json<ApiResponse<PageResponse<Document>>>> {
    let page = state
        .document_service
        .list(&auth, params.into_page_request())
        .await?;
    Ok(Json(ApiResponse::ok(page)))
}

/// GET /api/documents/{id}
pub async fn get_document(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<Document>>> {
    let id: DocumentId = parse_id(&id, "document")?;
    let document = state.document_service.get(&auth, id).await?;
    Ok(Json(ApiResponse::ok(document)))
}

/// POST /api/documents (multipart, field `file`)
pub async fn upload_document(
    State(state): State<AppState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ApiResponse<Document>>)> {
    let mut file_name: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut data: Option<Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("Multipart error: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        file_name = field.file_name().map(String::from);
        content_type = field.content_type().map(String::from);
        data = Some(
            field
                .bytes()
                .await
                .map_err(|e| AppError::validation(format!("Read error: {e}")))?,
        );
    }

    let data = data.ok_or_else(|| AppError::validation("Missing 'file' field"))?;
    let upload = UploadDocument {
        filename: file_name.unwrap_or_default(),
        content_type: content_type.unwrap_or_else(|| "application/octet-stream".to_string()),
        data,
    };

    let document = state.document_service.upload(&auth, upload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(document))))
}

/// DELETE /api/documents/{id}
pub async fn delete_document(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<MessageResponse>>> {
    let id: DocumentId = parse_id(&id, "document")?;
    state.document_service.delete(&auth, id).await?;
    Ok(Json(ApiResponse::ok(MessageResponse {
        message: "Document deleted".to_string(),
    })))
}
