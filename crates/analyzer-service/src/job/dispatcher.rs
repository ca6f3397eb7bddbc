//! Job admission: validate, record, then enqueue.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use analyzer_core::config::DispatchConfig;
use analyzer_core::error::AppError;
use analyzer_core::result::AppResult;
use analyzer_core::traits::WorkQueue;
use analyzer_core::types::{DocumentId, JobId};
use analyzer_database::{DocumentStore, JobStore};
use analyzer_entity::job::{JobSnapshot, JobStatus, NewJob};

use crate::context::RequestContext;

/// Reason stored on a job whose enqueue failed after it was recorded.
pub const NOT_SCHEDULED_REASON: &str = "Work queue unavailable; the job was not scheduled";

/// What a submitter gets back once a job is in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobHandle {
    /// The new job.
    pub job_id: JobId,
    /// Source document.
    pub document_id: DocumentId,
    /// Effective query, after defaulting.
    pub query: String,
    /// Always `queued` at submission.
    pub status: JobStatus,
}

/// Admits analysis jobs and serves their status.
#[derive(Debug, Clone)]
pub struct JobDispatcher {
    /// Job record store.
    jobs: Arc<dyn JobStore>,
    /// Document records, for the ownership check.
    documents: Arc<dyn DocumentStore>,
    /// Hand-off to workers.
    queue: Arc<dyn WorkQueue>,
    /// Submission policy.
    config: DispatchConfig,
    /// Claims allowed per job.
    max_attempts: i32,
}

impl JobDispatcher {
    /// Creates a new dispatcher.
    pub fn new(
        jobs: Arc<dyn JobStore>,
        documents: Arc<dyn DocumentStore>,
        queue: Arc<dyn WorkQueue>,
        config: DispatchConfig,
        max_attempts: i32,
    ) -> Self {
        Self {
            jobs,
            documents,
            queue,
            config,
            max_attempts,
        }
    }

    /// Submits a document for analysis.
    ///
    /// The record is written before the enqueue, so a poll issued as soon
    /// as this returns always finds the job. If the enqueue fails the
    /// record is failed and the caller gets `ServiceUnavailable`.
    pub async fn submit(
        &self,
        ctx: &RequestContext,
        document_id: DocumentId,
        query: Option<String>,
    ) -> AppResult<JobHandle> {
        let query = self.effective_query(query)?;

        let document = self
            .documents
            .find_by_id(document_id)
            .await?
            .filter(|d| d.is_owned_by(ctx.user_id))
            .ok_or_else(|| AppError::not_found("Document not found"))?;

        let job = self
            .jobs
            .create(NewJob {
                user_id: ctx.user_id,
                document_id: document.id,
                query,
                max_attempts: self.max_attempts,
            })
            .await?;

        if let Err(e) = self.queue.enqueue(job.id).await {
            error!(job_id = %job.id, error = %e, "Failed to enqueue job");
            match self.jobs.fail_unclaimed(job.id, NOT_SCHEDULED_REASON).await {
                Ok(outcome) if !outcome.is_applied() => {
                    warn!(job_id = %job.id, "Unscheduled job was no longer queued");
                }
                Ok(_) => {}
                Err(e) => error!(job_id = %job.id, error = %e, "Failed to fail unscheduled job"),
            }
            return Err(AppError::service_unavailable(
                "Work queue is unavailable, please retry later",
            ));
        }

        info!(
            job_id = %job.id,
            document_id = %job.document_id,
            user_id = %ctx.user_id,
            "Job submitted"
        );

        Ok(JobHandle {
            job_id: job.id,
            document_id: job.document_id,
            query: job.query,
            status: job.status,
        })
    }

    /// Returns the current snapshot of a job owned by the caller.
    pub async fn get_status(&self, ctx: &RequestContext, job_id: JobId) -> AppResult<JobSnapshot> {
        self.jobs
            .find_by_id(job_id)
            .await?
            .filter(|job| job.is_owned_by(ctx.user_id))
            .map(|job| job.snapshot())
            .ok_or_else(|| AppError::not_found("Job not found"))
    }

    fn effective_query(&self, query: Option<String>) -> AppResult<String> {
        let query = query
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .unwrap_or_else(|| self.config.default_query.clone());

        let chars = query.chars().count();
        if chars > self.config.max_query_chars {
            return Err(AppError::validation(format!(
                "Query is {chars} characters long; the limit is {}",
                self.config.max_query_chars
            )));
        }
        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;

    use analyzer_core::error::ErrorKind;
    use analyzer_core::traits::{Delivery, QueueDepth};
    use analyzer_core::types::UserId;
    use analyzer_database::memory::{MemoryDocumentStore, MemoryJobStore};
    use analyzer_entity::document::NewDocument;
    use analyzer_queue::MemoryWorkQueue;

    use super::*;

    #[derive(Debug)]
    struct BrokenQueue;

    #[async_trait]
    impl WorkQueue for BrokenQueue {
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

    struct Fixture {
        jobs: Arc<MemoryJobStore>,
        queue: Arc<dyn WorkQueue>,
        dispatcher: JobDispatcher,
        ctx: RequestContext,
        document_id: DocumentId,
    }

    async fn fixture(queue: Arc<dyn WorkQueue>) -> Fixture {
        let jobs = Arc::new(MemoryJobStore::new());
        let documents = Arc::new(MemoryDocumentStore::new());
        let ctx = RequestContext::new(UserId::new(), "analyst");
        let document_id = DocumentId::new();
        documents
            .create(NewDocument {
                id: document_id,
                owner_id: ctx.user_id,
                filename: "q3.txt".to_string(),
                content_type: "text/plain".to_string(),
                size_bytes: Bytes::from_static(b"revenue").len() as i64,
                storage_path: format!("documents/{}/{document_id}", ctx.user_id),
            })
            .await
            .unwrap();
        let dispatcher = JobDispatcher::new(
            jobs.clone(),
            documents,
            queue.clone(),
            DispatchConfig {
                max_query_chars: 20,
                ..DispatchConfig::default()
            },
            3,
        );
        Fixture {
            jobs,
            queue,
            dispatcher,
            ctx,
            document_id,
        }
    }

    #[tokio::test]
    async fn test_submit_records_then_enqueues() {
        let f = fixture(Arc::new(MemoryWorkQueue::new())).await;
        let handle = f
            .dispatcher
            .submit(&f.ctx, f.document_id, Some("  Summarize revenue ".into()))
            .await
            .unwrap();
        assert_eq!(handle.status, JobStatus::Queued);
        assert_eq!(handle.query, "Summarize revenue");

        let snapshot = f.dispatcher.get_status(&f.ctx, handle.job_id).await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Queued);
        assert_eq!(snapshot.progress, 0.0);

        let delivery = f.queue.dequeue(Duration::from_secs(5)).await.unwrap().unwrap();
        assert_eq!(delivery.job_id, handle.job_id);
    }

    #[tokio::test]
    async fn test_missing_query_uses_default() {
        let f = fixture(Arc::new(MemoryWorkQueue::new())).await;
        let dispatcher = JobDispatcher {
            config: DispatchConfig::default(),
            ..f.dispatcher.clone()
        };
        let handle = dispatcher
            .submit(&f.ctx, f.document_id, Some("   ".into()))
            .await
            .unwrap();
        assert_eq!(handle.query, DispatchConfig::default().default_query);
    }

    #[tokio::test]
    async fn test_overlong_query_creates_nothing() {
        let f = fixture(Arc::new(MemoryWorkQueue::new())).await;
        let err = f
            .dispatcher
            .submit(&f.ctx, f.document_id, Some("x".repeat(21)))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(f.queue.depth().await.unwrap(), QueueDepth::default());
        assert_eq!(f.jobs.job_count(), 0);
        assert!(f.jobs.jobs_for_document(f.document_id).is_empty());
    }

    #[tokio::test]
    async fn test_query_cap_counts_characters_not_bytes() {
        let f = fixture(Arc::new(MemoryWorkQueue::new())).await;
        // 20 two-byte characters.
        let query = "é".repeat(20);
        assert!(f.dispatcher.submit(&f.ctx, f.document_id, Some(query)).await.is_ok());
    }

    #[tokio::test]
    async fn test_foreign_document_is_not_found() {
        let f = fixture(Arc::new(MemoryWorkQueue::new())).await;
        let stranger = RequestContext::new(UserId::new(), "stranger");
        let err = f
            .dispatcher
            .submit(&stranger, f.document_id, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);

        let err = f
            .dispatcher
            .submit(&f.ctx, DocumentId::new(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_queue_outage_fails_the_record() {
        let f = fixture(Arc::new(BrokenQueue)).await;
        let err = f
            .dispatcher
            .submit(&f.ctx, f.document_id, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ServiceUnavailable);

        let recorded = f.jobs.jobs_for_document(f.document_id);
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].status, JobStatus::Failed);
        assert_eq!(recorded[0].error_message.as_deref(), Some(NOT_SCHEDULED_REASON));
    }

    #[tokio::test]
    async fn test_status_is_owner_scoped() {
        let f = fixture(Arc::new(MemoryWorkQueue::new())).await;
        let handle = f.dispatcher.submit(&f.ctx, f.document_id, None).await.unwrap();
        let stranger = RequestContext::new(UserId::new(), "stranger");
        let err = f
            .dispatcher
            .get_status(&stranger, handle.job_id)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        let err = f
            .dispatcher
            .get_status(&f.ctx, JobId::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
}
