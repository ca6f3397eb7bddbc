//! Shared test helpers for integration tests.
//!
//! Every `TestApp` runs the full router over in-process backends, so the
//! tests need no external services.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use analyzer_api::{Backends, build_app, build_state, build_worker};
use analyzer_auth::JwtEncoder;
use analyzer_cache::memory::MemoryCacheProvider;
use analyzer_core::config::AppConfig;
use analyzer_core::error::AppError;
use analyzer_core::result::AppResult;
use analyzer_core::traits::{CacheProvider, Delivery, QueueDepth, WorkQueue};
use analyzer_core::types::{JobId, UserId};
use analyzer_database::Stores;
use analyzer_database::memory::{MemoryDocumentStore, MemoryJobStore};
use analyzer_entity::job::JobSnapshot;
use analyzer_queue::MemoryWorkQueue;
use analyzer_service::JobStatusSource;
use analyzer_storage::MemoryStorageProvider;
use analyzer_worker::WorkerRunner;

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Application config
    pub config: AppConfig,
    /// Backends shared by the router and any worker built from this app
    pub backends: Backends,
    /// Direct handle on the job record store
    pub jobs: Arc<MemoryJobStore>,
    /// Direct handle on the blob store
    pub blobs: Arc<MemoryStorageProvider>,
    encoder: JwtEncoder,
}

impl TestApp {
    /// Create a test application over healthy in-memory backends.
    pub fn new() -> Self {
        Self::with_backends(
            Arc::new(MemoryWorkQueue::new()),
            Arc::new(MemoryCacheProvider::new(&Default::default())),
        )
    }

    /// Create a test application with a specific queue and cache.
    pub fn with_backends(queue: Arc<dyn WorkQueue>, cache: Arc<dyn CacheProvider>) -> Self {
        let config = test_config();
        let jobs = Arc::new(MemoryJobStore::new());
        let blobs = Arc::new(MemoryStorageProvider::new());
        let stores = Stores {
            jobs: jobs.clone(),
            analyses: jobs.clone(),
            documents: Arc::new(MemoryDocumentStore::new()),
            pool: None,
        };
        let backends = Backends::from_parts(stores, cache, queue, blobs.clone(), &config);
        let router = build_app(build_state(&config, &backends));

        Self {
            router,
            encoder: JwtEncoder::new(&config.auth),
            config,
            backends,
            jobs,
            blobs,
        }
    }

    /// Mint a bearer token for `user`.
    pub fn token(&self, user: UserId) -> String {
        self.encoder
            .generate_access_token(user, "analyst")
            .expect("Failed to mint token")
            .0
    }

    /// A new user and a token for them.
    pub fn user(&self) -> (UserId, String) {
        let user = UserId::new();
        (user, self.token(user))
    }

    /// A worker over this app's backends.
    pub fn worker(&self) -> WorkerRunner {
        build_worker(&self.config, &self.backends).expect("Failed to build worker")
    }

    /// Make a JSON request against the router.
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let body_str = body
            .map(|b| serde_json::to_string(&b).expect("Failed to serialize body"))
            .unwrap_or_default();

        let mut req = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", "application/json");

        if let Some(token) = token {
            req = req.header("Authorization", format!("Bearer {}", token));
        }

        let req = req
            .body(Body::from(body_str))
            .expect("Failed to build request");
        self.send(req).await
    }

    /// Upload a document through the multipart endpoint.
    pub async fn upload(
        &self,
        token: &str,
        filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> TestResponse {
        let boundary = "analyzer-test-boundary";
        let mut body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let req = Request::builder()
            .method("POST")
            .uri("/api/documents")
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .header("Authorization", format!("Bearer {}", token))
            .body(Body::from(body))
            .expect("Failed to build request");
        self.send(req).await
    }

    /// Upload a text document and return its id.
    pub async fn upload_text(&self, token: &str, text: &str) -> String {
        let response = self
            .upload(token, "report.txt", "text/plain", text.as_bytes())
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.data()["id"]
            .as_str()
            .expect("document id")
            .to_string()
    }

    /// Submit a job and return its id.
    pub async fn submit(&self, token: &str, document_id: &str, query: &str) -> String {
        let response = self
            .request(
                "POST",
                "/api/jobs",
                Some(serde_json::json!({ "document_id": document_id, "query": query })),
                Some(token),
            )
            .await;
        assert_eq!(response.status, StatusCode::ACCEPTED, "{}", response.body);
        response.data()["job_id"]
            .as_str()
            .expect("job id")
            .to_string()
    }

    async fn send(&self, req: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("Failed to read body");

        let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

        TestResponse { status, body }
    }
}

/// Configuration used by every test app.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.database.provider = "memory".to_string();
    config.cache.provider = "memory".to_string();
    config.queue.provider = "memory".to_string();
    config.storage.provider = "memory".to_string();
    config.worker.retry_backoff_ms = 10;
    // Polling tests issue many status requests in quick succession.
    config.dispatch.rate_limit.status_max_requests = 10_000;
    config
}

/// Simplified test response
#[derive(Debug)]
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Parsed JSON body
    pub body: Value,
}

impl TestResponse {
    /// The `data` member of a success envelope.
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }
}

/// Reads job status through the HTTP API, the way a client would.
pub struct HttpStatusSource<'a> {
    pub app: &'a TestApp,
    pub token: String,
}

#[async_trait]
impl JobStatusSource for HttpStatusSource<'_> {
    async fn fetch_status(&self, job_id: JobId) -> AppResult<JobSnapshot> {
        let response = self
            .app
            .request("GET", &format!("/api/jobs/{job_id}"), None, Some(&self.token))
            .await;
        if response.status != StatusCode::OK {
            return Err(AppError::internal(format!(
                "status request failed: {} {}",
                response.status, response.body
            )));
        }
        serde_json::from_value(response.data().clone())
            .map_err(|e| AppError::internal(format!("bad snapshot: {e}")))
    }
}

/// A broker that refuses every operation.
#[derive(Debug)]
pub struct DownQueue;

#[async_trait]
impl WorkQueue for DownQueue {
    async fn enqueue(&self, _job_id: JobId) -> AppResult<()> {
        Err(AppError::queue("connection refused"))
    }
    async fn dequeue(&self, _visibility: Duration) -> AppResult<Option<Delivery>> {
        Err(AppError::queue("connection refused"))
    }
    async fn ack(&self, _delivery: &Delivery) -> AppResult<bool> {
        Err(AppError::queue("connection refused"))
    }
    async fn extend(&self, _delivery: &Delivery, _visibility: Duration) -> AppResult<bool> {
        Err(AppError::queue("connection refused"))
    }
    async fn release(&self, _delivery: &Delivery) -> AppResult<bool> {
        Err(AppError::queue("connection refused"))
    }
    async fn requeue_expired(&self) -> AppResult<u64> {
        Err(AppError::queue("connection refused"))
    }
    async fn depth(&self) -> AppResult<QueueDepth> {
        Err(AppError::queue("connection refused"))
    }
    async fn health_check(&self) -> AppResult<bool> {
        Ok(false)
    }
}

/// A cache that fails every call.
#[derive(Debug)]
pub struct DownCache;

#[async_trait]
impl CacheProvider for DownCache {
    async fn get(&self, _key: &str) -> AppResult<Option<String>> {
        Err(AppError::cache("cache offline"))
    }
    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> AppResult<()> {
        Err(AppError::cache("cache offline"))
    }
    async fn delete(&self, _key: &str) -> AppResult<()> {
        Err(AppError::cache("cache offline"))
    }
    async fn exists(&self, _key: &str) -> AppResult<bool> {
        Err(AppError::cache("cache offline"))
    }
    async fn delete_pattern(&self, _pattern: &str) -> AppResult<u64> {
        Err(AppError::cache("cache offline"))
    }
    async fn incr(&self, _key: &str) -> AppResult<i64> {
        Err(AppError::cache("cache offline"))
    }
    async fn expire(&self, _key: &str, _ttl: Duration) -> AppResult<bool> {
        Err(AppError::cache("cache offline"))
    }
    async fn health_check(&self) -> AppResult<bool> {
        Ok(false)
    }
}
