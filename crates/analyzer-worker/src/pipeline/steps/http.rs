//! Remote analysis step.
//!
//! POSTs the document text, the query and earlier step outputs to a
//! configured endpoint and uses the response's `output` field.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use analyzer_core::config::HttpStepConfig;
use analyzer_core::error::{AppError, ErrorKind};
use analyzer_core::result::AppResult;

use crate::pipeline::{AnalysisStep, StepError, StepInput, StepOutput};

#[derive(Debug, Serialize)]
struct RemoteRequest<'a> {
    document: &'a str,
    query: &'a str,
    previous: &'a [StepOutput],
}

#[derive(Debug, Deserialize)]
struct RemoteResponse {
    output: String,
}

/// Calls a remote analysis endpoint.
#[derive(Debug, Clone)]
pub struct HttpStep {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpStep {
    /// Build the client. Requires `worker.http_step.url`.
    pub fn new(config: &HttpStepConfig, timeout: Duration) -> AppResult<Self> {
        let url = config
            .url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| AppError::configuration("worker.http_step.url is required for the http step"))?;

        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| {
                AppError::with_source(ErrorKind::Configuration, "Failed to build HTTP client", e)
            })?;

        Ok(Self {
            client,
            url,
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl AnalysisStep for HttpStep {
    fn name(&self) -> &str {
        "http"
    }

    async fn run(&self, input: &StepInput<'_>) -> Result<String, StepError> {
        let text = input.text();
        let mut request = self.client.post(&self.url).json(&RemoteRequest {
            document: &text,
            query: input.query,
            previous: input.previous,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() || e.is_request() {
                StepError::Transient(format!("Remote analysis unreachable: {e}"))
            } else {
                StepError::Permanent(format!("Remote analysis request failed: {e}"))
            }
        })?;

        let status = response.status();
        debug!(url = %self.url, status = %status, "Remote analysis responded");
        if !status.is_success() {
            let message = format!("Remote analysis returned {status}");
            return Err(if is_retryable(status) {
                StepError::Transient(message)
            } else {
                StepError::Permanent(message)
            });
        }

        let body: RemoteResponse = response
            .json()
            .await
            .map_err(|e| StepError::Permanent(format!("Malformed remote analysis response: {e}")))?;
        Ok(body.output)
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}
