//! Integration tests for the document endpoints and their cached reads.

mod helpers;

use std::sync::Arc;

use axum::http::StatusCode;

use analyzer_queue::MemoryWorkQueue;
use analyzer_storage::pdf::render_text_pdf;
use analyzer_worker::ProcessOutcome;

use helpers::{DownCache, TestApp};

#[tokio::test]
async fn test_deleted_document_disappears_from_cached_listing() {
    let app = TestApp::new();
    let (_, token) = app.user();
    let keep = app.upload_text(&token, "Revenue: $10 million").await;
    let gone = app.upload_text(&token, "Revenue: $20 million").await;

    // Warm the listing and detail caches.
    let listing = app.request("GET", "/api/documents", None, Some(&token)).await;
    assert_eq!(listing.data()["total_items"], 2);
    let detail = app
        .request("GET", &format!("/api/documents/{gone}"), None, Some(&token))
        .await;
    assert_eq!(detail.status, StatusCode::OK);

    let deleted = app
        .request("DELETE", &format!("/api/documents/{gone}"), None, Some(&token))
        .await;
    assert_eq!(deleted.status, StatusCode::OK);

    let listing = app.request("GET", "/api/documents", None, Some(&token)).await;
    assert_eq!(listing.status, StatusCode::OK);
    assert_eq!(listing.data()["total_items"], 1);
    assert_eq!(listing.data()["items"][0]["id"], keep.as_str());

    let detail = app
        .request("GET", &format!("/api/documents/{gone}"), None, Some(&token))
        .await;
    assert_eq!(detail.status, StatusCode::NOT_FOUND);
    assert_eq!(app.blobs.len(), 1);
}

#[tokio::test]
async fn test_cache_outage_falls_back_to_the_store() {
    let app = TestApp::with_backends(Arc::new(MemoryWorkQueue::new()), Arc::new(DownCache));
    let (_, token) = app.user();

    let id = app.upload_text(&token, "Revenue: $10 million").await;

    let listing = app.request("GET", "/api/documents", None, Some(&token)).await;
    assert_eq!(listing.status, StatusCode::OK);
    assert_eq!(listing.data()["total_items"], 1);

    let detail = app
        .request("GET", &format!("/api/documents/{id}"), None, Some(&token))
        .await;
    assert_eq!(detail.status, StatusCode::OK);

    // Submission still works: rate limiting fails open.
    app.submit(&token, &id, "Summarize revenue").await;

    let health = app.request("GET", "/api/health", None, None).await;
    assert_eq!(health.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health.data()["status"], "degraded");
    assert_eq!(health.data()["components"]["cache"], false);
    assert_eq!(health.data()["components"]["queue"], true);
}

#[tokio::test]
async fn test_upload_rejects_unsupported_types() {
    let app = TestApp::new();
    let (_, token) = app.user();

    let response = app
        .upload(&token, "setup.exe", "application/x-msdownload", b"MZ\x90\x00")
        .await;
    assert_eq!(response.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(response.body["error"], "UNSUPPORTED_MEDIA_TYPE");
    assert!(app.blobs.is_empty());
}

#[tokio::test]
async fn test_pdf_upload_without_magic_header_is_415() {
    let app = TestApp::new();
    let (_, token) = app.user();

    let response = app
        .upload(&token, "invoice.pdf", "application/pdf", b"MZ\x90\x00 not a pdf")
        .await;
    assert_eq!(response.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(response.body["success"], false);
    assert_eq!(response.body["error"], "UNSUPPORTED_MEDIA_TYPE");
    assert!(app.blobs.is_empty());
}

#[tokio::test]
async fn test_unreadable_or_scanned_pdf_is_422() {
    let app = TestApp::new();
    let (_, token) = app.user();

    let corrupt = app
        .upload(&token, "broken.pdf", "application/pdf", b"%PDF-1.4\n\x00\x01\x02 truncated")
        .await;
    assert_eq!(corrupt.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(corrupt.body["error"], "UNPROCESSABLE_DOCUMENT");

    let scanned = app
        .upload(&token, "scan.pdf", "application/pdf", &render_text_pdf(&[]))
        .await;
    assert_eq!(scanned.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(
        scanned.body["message"].as_str().unwrap().contains("OCR"),
        "{}",
        scanned.body
    );

    let listing = app.request("GET", "/api/documents", None, Some(&token)).await;
    assert_eq!(listing.data()["total_items"], 0);
    assert!(app.blobs.is_empty());
}

#[tokio::test]
async fn test_compressed_pdf_is_analyzed_from_its_text_layer() {
    let app = TestApp::new();
    let (_, token) = app.user();
    let pdf = render_text_pdf(&[
        "ACME Corp quarterly results",
        "Revenue: $1.2 billion",
        "Net income: $300 million",
        "The board approved a share buyback.",
        "The board approved a share buyback.",
        "The board approved a share buyback.",
    ]);
    assert!(pdf.windows(11).any(|w| w == b"FlateDecode"));

    let upload = app.upload(&token, "q3.pdf", "application/pdf", &pdf).await;
    assert_eq!(upload.status, StatusCode::CREATED, "{}", upload.body);
    let document_id = upload.data()["id"].as_str().unwrap().to_string();

    let job_id = app.submit(&token, &document_id, "Summarize revenue").await;
    let outcomes = app.worker().drain().await;
    assert!(matches!(outcomes.as_slice(), [ProcessOutcome::Completed(_)]));

    let status = app
        .request("GET", &format!("/api/jobs/{job_id}"), None, Some(&token))
        .await;
    assert_eq!(status.data()["status"], "completed");
    let analysis_id = status.data()["analysis_result_ref"].as_str().unwrap();

    let analysis = app
        .request("GET", &format!("/api/analyses/{analysis_id}"), None, Some(&token))
        .await;
    let summary = analysis.data()["summary"].as_str().unwrap();
    let flat = summary.split_whitespace().collect::<Vec<_>>().join(" ");
    assert!(flat.contains("Revenue: $1.2 billion"), "{summary}");
    assert!(summary.contains("revenue: "), "{summary}");
    assert!(!flat.contains("FlateDecode"));
    assert!(!flat.contains("endstream"));
}

#[tokio::test]
async fn test_listing_is_paginated_and_owner_scoped() {
    let app = TestApp::new();
    let (_, owner) = app.user();
    let (_, other) = app.user();
    for i in 0..3 {
        app.upload_text(&owner, &format!("Revenue: ${i} million")).await;
    }
    app.upload_text(&other, "Revenue: $5 million").await;

    let page = app
        .request("GET", "/api/documents?page=2&page_size=2", None, Some(&owner))
        .await;
    assert_eq!(page.status, StatusCode::OK);
    assert_eq!(page.data()["total_items"], 3);
    assert_eq!(page.data()["items"].as_array().unwrap().len(), 1);
    assert_eq!(page.data()["has_previous"], true);
    assert_eq!(page.data()["has_next"], false);
}

#[tokio::test]
async fn test_health_reports_ok_when_everything_is_up() {
    let app = TestApp::new();
    let health = app.request("GET", "/api/health", None, None).await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.data()["status"], "ok");
}
