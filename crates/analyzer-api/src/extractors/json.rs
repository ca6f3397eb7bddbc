//! JSON body extractor whose rejections use the API error envelope.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};

use analyzer_core::error::AppError;

use crate::error::ApiError;

/// Like [`axum::Json`], but any body rejection becomes a
/// `400 VALIDATION_ERROR` response instead of axum's plain-text rejection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError(AppError::validation(rejection.body_text()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Named {
        #[allow(dead_code)]
        name: String,
    }

    async fn extract(content_type: &str, body: &'static str) -> Result<ApiJson<Named>, ApiError> {
        let req = Request::builder()
            .method("POST")
            .uri("/")
            .header("Content-Type", content_type)
            .body(Body::from(body))
            .unwrap();
        ApiJson::<Named>::from_request(req, &()).await
    }

    #[tokio::test]
    async fn test_rejections_are_validation_errors() {
        for (content_type, body) in [
            ("application/json", "{}"),
            ("application/json", ""),
            ("application/json", "{\"name\": 7}"),
            ("text/plain", "{\"name\": \"q3\"}"),
        ] {
            let err = extract(content_type, body).await.unwrap_err();
            assert_eq!(err.0.kind, analyzer_core::error::ErrorKind::Validation, "{body}");
            assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_missing_field_is_named() {
        let err = extract("application/json", "{}").await.unwrap_err();
        assert!(err.0.message.contains("name"), "{}", err.0.message);
    }

    #[tokio::test]
    async fn test_valid_body_passes_through() {
        assert!(extract("application/json", "{\"name\": \"q3\"}").await.is_ok());
    }
}
