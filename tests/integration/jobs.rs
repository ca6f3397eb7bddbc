//! Integration tests for job submission, processing and status polling.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;

use analyzer_core::traits::{StorageProvider, WorkQueue};
use analyzer_core::types::{DocumentId, JobId};
use analyzer_entity::job::JobStatus;
use analyzer_service::StatusPoller;
use analyzer_worker::ProcessOutcome;

use helpers::{DownQueue, HttpStatusSource, TestApp};

const QUARTERLY_REPORT: &str = "ACME Corp quarterly results\n\
    Revenue: $1.2 billion\n\
    Net income: $300 million\n\
    The board approved a share buyback.\n";

#[tokio::test]
async fn test_revenue_summary_end_to_end() {
    let app = TestApp::new();
    let (_, token) = app.user();
    let document_id = app.upload_text(&token, QUARTERLY_REPORT).await;
    let job_id = app.submit(&token, &document_id, "Summarize revenue").await;

    let outcomes = app.worker().drain().await;
    assert!(matches!(outcomes.as_slice(), [ProcessOutcome::Completed(_)]));

    let status = app
        .request("GET", &format!("/api/jobs/{job_id}"), None, Some(&token))
        .await;
    assert_eq!(status.status, StatusCode::OK);
    let snapshot = status.data();
    assert_eq!(snapshot["status"], "completed");
    assert_eq!(snapshot["progress"], 1.0);
    assert_eq!(snapshot["error"], serde_json::Value::Null);
    let analysis_id = snapshot["analysis_result_ref"]
        .as_str()
        .expect("completed job carries a result reference");

    let analysis = app
        .request("GET", &format!("/api/analyses/{analysis_id}"), None, Some(&token))
        .await;
    assert_eq!(analysis.status, StatusCode::OK);
    let summary = analysis.data()["summary"].as_str().unwrap();
    assert!(summary.starts_with("Summary for \"Summarize revenue\":"));
    assert!(summary.contains("Revenue: $1.2 billion"));
    assert!(summary.contains("revenue: 1200000000"));
    assert!(summary.contains("net_margin: 25"));
    assert_eq!(analysis.data()["document_id"], document_id.as_str());
    assert_eq!(analysis.data()["query"], "Summarize revenue");
}

#[tokio::test]
async fn test_status_is_visible_immediately_after_submit() {
    let app = TestApp::new();
    let (_, token) = app.user();
    let document_id = app.upload_text(&token, QUARTERLY_REPORT).await;

    let submit = app
        .request(
            "POST",
            "/api/jobs",
            Some(json!({ "document_id": document_id })),
            Some(&token),
        )
        .await;
    assert_eq!(submit.status, StatusCode::ACCEPTED);
    assert_eq!(submit.data()["status"], "queued");
    assert_eq!(
        submit.data()["query"],
        app.config.dispatch.default_query.as_str()
    );

    let job_id = submit.data()["job_id"].as_str().unwrap();
    let status = app
        .request("GET", &format!("/api/jobs/{job_id}"), None, Some(&token))
        .await;
    assert_eq!(status.status, StatusCode::OK);
    assert_eq!(status.data()["status"], "queued");
    assert_eq!(status.data()["progress"], 0.0);
}

#[tokio::test]
async fn test_overlong_query_is_rejected_without_a_record() {
    let app = TestApp::new();
    let (_, token) = app.user();
    let document_id = app.upload_text(&token, QUARTERLY_REPORT).await;
    let query = "x".repeat(app.config.dispatch.max_query_chars + 1);

    let response = app
        .request(
            "POST",
            "/api/jobs",
            Some(json!({ "document_id": document_id, "query": query })),
            Some(&token),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "VALIDATION_ERROR");
    let document_id: DocumentId = document_id.parse().unwrap();
    assert!(app.jobs.jobs_for_document(document_id).is_empty());
}

#[tokio::test]
async fn test_queue_outage_returns_503_and_fails_the_job() {
    let app = TestApp::with_backends(
        Arc::new(DownQueue),
        Arc::new(analyzer_cache::memory::MemoryCacheProvider::new(
            &Default::default(),
        )),
    );
    let (_, token) = app.user();
    let document_id = app.upload_text(&token, QUARTERLY_REPORT).await;

    let response = app
        .request(
            "POST",
            "/api/jobs",
            Some(json!({ "document_id": document_id })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);

    let document_id: DocumentId = document_id.parse().unwrap();
    let recorded = app.jobs.jobs_for_document(document_id);
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].status, JobStatus::Failed);
    assert!(recorded[0].error_message.is_some());
}

#[tokio::test]
async fn test_polled_progress_never_goes_backwards() {
    let app = TestApp::new();
    let (_, token) = app.user();
    let document_id = app.upload_text(&token, QUARTERLY_REPORT).await;
    let job_id: JobId = app
        .submit(&token, &document_id, "Summarize revenue")
        .await
        .parse()
        .unwrap();

    let source = HttpStatusSource {
        app: &app,
        token: token.clone(),
    };
    let poller = StatusPoller::new(Duration::from_millis(1), Duration::from_millis(5))
        .with_deadline(Duration::from_secs(10));
    let mut seen = Vec::new();
    let worker = app.worker();

    let (outcomes, done) = tokio::join!(
        worker.drain(),
        poller.wait_for_terminal(&source, job_id, |update| seen.push(update.percent)),
    );

    assert!(matches!(outcomes.as_slice(), [ProcessOutcome::Completed(_)]));
    let done = done.unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
    assert_eq!(seen.last(), Some(&100.0));
}

#[tokio::test]
async fn test_jobs_are_invisible_to_other_users() {
    let app = TestApp::new();
    let (_, owner) = app.user();
    let (_, stranger) = app.user();
    let document_id = app.upload_text(&owner, QUARTERLY_REPORT).await;
    let job_id = app.submit(&owner, &document_id, "Summarize revenue").await;

    let status = app
        .request("GET", &format!("/api/jobs/{job_id}"), None, Some(&stranger))
        .await;
    assert_eq!(status.status, StatusCode::NOT_FOUND);

    // Another user's document cannot be submitted either.
    let submit = app
        .request(
            "POST",
            "/api/jobs",
            Some(json!({ "document_id": document_id })),
            Some(&stranger),
        )
        .await;
    assert_eq!(submit.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_job_routes_require_a_token() {
    let app = TestApp::new();
    let response = app
        .request("GET", &format!("/api/jobs/{}", JobId::new()), None, None)
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let (_, token) = app.user();
    let response = app
        .request("GET", "/api/jobs/not-a-uuid", None, Some(&token))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_submit_body_uses_the_error_envelope() {
    let app = TestApp::new();
    let (_, token) = app.user();

    let response = app
        .request("POST", "/api/jobs", Some(json!({})), Some(&token))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["success"], false);
    assert_eq!(response.body["error"], "VALIDATION_ERROR");
    let message = response.body["message"].as_str().expect("message is a string");
    assert!(message.contains("document_id"), "{message}");

    // No body at all is rejected the same way.
    let response = app.request("POST", "/api/jobs", None, Some(&token)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "VALIDATION_ERROR");

    let response = app
        .request("POST", "/api/jobs", Some(json!({ "document_id": 42 })), Some(&token))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["success"], false);
}

#[tokio::test]
async fn test_finished_job_appears_in_a_previously_cached_analysis_listing() {
    let app = TestApp::new();
    let (_, token) = app.user();

    // Cache the empty listing before any analysis exists.
    let listing = app.request("GET", "/api/analyses", None, Some(&token)).await;
    assert_eq!(listing.status, StatusCode::OK);
    assert_eq!(listing.data()["total_items"], 0);
    let listing = app.request("GET", "/api/analyses", None, Some(&token)).await;
    assert_eq!(listing.data()["total_items"], 0);

    let document_id = app.upload_text(&token, QUARTERLY_REPORT).await;
    app.submit(&token, &document_id, "Summarize revenue").await;
    let outcomes = app.worker().drain().await;
    let analysis_id = match outcomes.as_slice() {
        [ProcessOutcome::Completed(id)] => id.to_string(),
        other => panic!("unexpected outcomes: {other:?}"),
    };

    let listing = app.request("GET", "/api/analyses", None, Some(&token)).await;
    assert_eq!(listing.status, StatusCode::OK);
    assert_eq!(listing.data()["total_items"], 1);
    assert_eq!(listing.data()["items"][0]["id"], analysis_id.as_str());
}

async fn poll_body(app: &TestApp, token: &str, job_id: &str) -> serde_json::Value {
    let response = app
        .request("GET", &format!("/api/jobs/{job_id}"), None, Some(token))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    response.body
}

/// Polls a terminal job repeatedly, including after the worker sees the
/// job again, and checks every response is identical.
async fn assert_terminal_snapshot_is_stable(app: &TestApp, token: &str, job_id: &str) {
    let first = poll_body(app, token, job_id).await;
    for _ in 0..3 {
        assert_eq!(poll_body(app, token, job_id).await, first);
    }

    assert!(app.worker().drain().await.is_empty());
    assert_eq!(poll_body(app, token, job_id).await, first);

    // A duplicate delivery of a finished job changes nothing.
    let parsed: JobId = job_id.parse().unwrap();
    app.backends.queue.enqueue(parsed).await.unwrap();
    let outcomes = app.worker().drain().await;
    assert!(matches!(outcomes.as_slice(), [ProcessOutcome::Skipped]), "{outcomes:?}");
    assert_eq!(poll_body(app, token, job_id).await, first);
}

#[tokio::test]
async fn test_completed_job_status_is_stable_across_polls() {
    let app = TestApp::new();
    let (_, token) = app.user();
    let document_id = app.upload_text(&token, QUARTERLY_REPORT).await;
    let job_id = app.submit(&token, &document_id, "Summarize revenue").await;
    let outcomes = app.worker().drain().await;
    assert!(matches!(outcomes.as_slice(), [ProcessOutcome::Completed(_)]));

    let body = poll_body(&app, &token, &job_id).await;
    assert_eq!(body["data"]["status"], "completed");
    assert_terminal_snapshot_is_stable(&app, &token, &job_id).await;
}

#[tokio::test]
async fn test_failed_job_status_is_stable_across_polls() {
    let app = TestApp::new();
    let (user, token) = app.user();
    let document_id = app.upload_text(&token, QUARTERLY_REPORT).await;
    let job_id = app.submit(&token, &document_id, "Summarize revenue").await;
    app.blobs
        .delete(&analyzer_storage::document_path(
            user,
            document_id.parse().unwrap(),
        ))
        .await
        .unwrap();
    let outcomes = app.worker().drain().await;
    assert!(matches!(outcomes.as_slice(), [ProcessOutcome::Failed(_)]));

    let body = poll_body(&app, &token, &job_id).await;
    assert_eq!(body["data"]["status"], "failed");
    assert_terminal_snapshot_is_stable(&app, &token, &job_id).await;
}
