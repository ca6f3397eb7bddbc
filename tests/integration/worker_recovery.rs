//! Integration tests for worker failure handling: unreadable documents,
//! crashed workers and duplicate deliveries.

mod helpers;

use std::time::Duration;

use axum::http::StatusCode;

use analyzer_core::traits::StorageProvider;
use analyzer_core::types::{DocumentId, JobId, UserId};
use analyzer_database::{ClaimOutcome, JobStore, WriteOutcome};
use analyzer_entity::job::JobStatus;
use analyzer_worker::ProcessOutcome;

use helpers::TestApp;

const REPORT: &str = "Revenue: $1.2 billion\nNet income: $300 million\n";

async fn submitted(app: &TestApp) -> (UserId, String, DocumentId, JobId) {
    let (user, token) = app.user();
    let document_id = app.upload_text(&token, REPORT).await;
    let job_id = app.submit(&token, &document_id, "Summarize revenue").await;
    (
        user,
        token,
        document_id.parse().unwrap(),
        job_id.parse().unwrap(),
    )
}

#[tokio::test]
async fn test_missing_blob_fails_the_job_with_a_reason() {
    let app = TestApp::new();
    let (user, token, document_id, job_id) = submitted(&app).await;
    app.blobs
        .delete(&analyzer_storage::document_path(user, document_id))
        .await
        .unwrap();

    let outcomes = app.worker().drain().await;
    match outcomes.as_slice() {
        [ProcessOutcome::Failed(reason)] => assert!(reason.starts_with("Document unavailable")),
        other => panic!("unexpected outcomes: {other:?}"),
    }

    let status = app
        .request("GET", &format!("/api/jobs/{job_id}"), None, Some(&token))
        .await;
    assert_eq!(status.status, StatusCode::OK);
    assert_eq!(status.data()["status"], "failed");
    assert_eq!(status.data()["analysis_result_ref"], serde_json::Value::Null);
    assert!(
        status.data()["error"]
            .as_str()
            .unwrap()
            .starts_with("Document unavailable")
    );
}

#[tokio::test]
async fn test_expired_lease_is_reclaimed_by_another_worker() {
    let app = TestApp::new();
    let (_, _, _, job_id) = submitted(&app).await;

    // A worker takes the job and then dies without acknowledging.
    let short = Duration::from_millis(20);
    app.backends.queue.dequeue(short).await.unwrap().unwrap();
    let ClaimOutcome::Claimed { lease: stale, .. } = app
        .jobs
        .claim(job_id, "crashed-worker", short, 0.05)
        .await
        .unwrap()
    else {
        panic!("expected a claim");
    };

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(app.backends.queue.requeue_expired().await.unwrap(), 1);

    let outcomes = app.worker().drain().await;
    assert!(matches!(outcomes.as_slice(), [ProcessOutcome::Completed(_)]));

    let job = app.jobs.find_by_id(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.attempts, 2);

    // The crashed worker's lease can no longer write.
    assert_eq!(
        app.jobs.record_progress(&stale, 0.5).await.unwrap(),
        WriteOutcome::Rejected
    );
}

#[tokio::test]
async fn test_duplicate_delivery_finalizes_once() {
    let app = TestApp::new();
    let (_, _, _, job_id) = submitted(&app).await;
    app.backends.queue.enqueue(job_id).await.unwrap();

    let (a, b) = (app.worker(), app.worker());
    let (first, second) = tokio::join!(a.drain(), b.drain());
    let outcomes: Vec<_> = first.into_iter().chain(second).collect();

    let completed = outcomes
        .iter()
        .filter(|o| matches!(o, ProcessOutcome::Completed(_)))
        .count();
    assert_eq!(completed, 1, "{outcomes:?}");
    assert!(
        outcomes
            .iter()
            .all(|o| matches!(o, ProcessOutcome::Completed(_) | ProcessOutcome::Skipped | ProcessOutcome::Deferred)),
        "{outcomes:?}"
    );
    assert_eq!(app.jobs.result_count(), 1);
}
