//! Minimal HTTP client for the job endpoints.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use analyzer_api::dto::request::SubmitJobRequest;
use analyzer_api::dto::response::ApiResponse;
use analyzer_api::error::ApiErrorResponse;
use analyzer_core::error::{AppError, ErrorKind};
use analyzer_core::result::AppResult;
use analyzer_core::types::{DocumentId, JobId};
use analyzer_entity::job::JobSnapshot;
use analyzer_service::{JobHandle, JobStatusSource};

/// Talks to a running analyzer server on behalf of one user.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    /// Creates a client for `base_url` (without the `/api` suffix).
    pub fn new(base_url: &str, token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Submit a document for analysis.
    pub async fn submit(&self, document_id: DocumentId, query: Option<String>) -> AppResult<JobHandle> {
        let body = SubmitJobRequest {
            document_id: document_id.to_string(),
            query,
        };
        let request = self
            .http
            .post(format!("{}/api/jobs", self.base_url))
            .json(&body);
        self.send(request).await
    }

    async fn send<T>(&self, request: RequestBuilder) -> AppResult<T>
    where
        T: DeserializeOwned + serde::Serialize,
    {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| AppError::service_unavailable(format!("Server unreachable: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            let envelope: ApiResponse<T> = response.json().await.map_err(|e| {
                AppError::new(ErrorKind::Serialization, format!("Unexpected response body: {}", e))
            })?;
            return Ok(envelope.data);
        }

        let message = match response.json::<ApiErrorResponse>().await {
            Ok(body) => body.message,
            Err(_) => status.to_string(),
        };
        Err(AppError::new(kind_for(status), message))
    }
}

#[async_trait]
impl JobStatusSource for ApiClient {
    async fn fetch_status(&self, job_id: JobId) -> AppResult<JobSnapshot> {
        let request = self
            .http
            .get(format!("{}/api/jobs/{}", self.base_url, job_id));
        self.send(request).await
    }
}

/// Map a response status back onto the server's error kinds.
fn kind_for(status: StatusCode) -> ErrorKind {
    match status {
        StatusCode::BAD_REQUEST => ErrorKind::Validation,
        StatusCode::UNAUTHORIZED => ErrorKind::Authentication,
        StatusCode::NOT_FOUND => ErrorKind::NotFound,
        StatusCode::CONFLICT => ErrorKind::Conflict,
        StatusCode::UNSUPPORTED_MEDIA_TYPE => ErrorKind::UnsupportedMediaType,
        StatusCode::UNPROCESSABLE_ENTITY => ErrorKind::UnprocessableDocument,
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimit,
        StatusCode::SERVICE_UNAVAILABLE => ErrorKind::ServiceUnavailable,
        _ => ErrorKind::ExternalService,
    }
}
