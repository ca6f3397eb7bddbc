//! Store traits shared by the dispatcher, the worker and the read services.
//!
//! The job store is the source of truth for job state. Every write made by
//! a worker carries its [`JobLease`] and is a compare-and-set on
//! `(status = running, lease_generation)`: a worker whose lease has been
//! superseded can never change a job again.

use std::time::Duration;

use async_trait::async_trait;

use analyzer_core::result::AppResult;
use analyzer_core::types::{AnalysisId, DocumentId, JobId, PageRequest, PageResponse, UserId};
use analyzer_entity::analysis::{AnalysisFilter, AnalysisResult, NewAnalysisResult};
use analyzer_entity::document::{Document, NewDocument};
use analyzer_entity::job::{Job, JobLease, NewJob};

/// Reason recorded when a job runs out of claims.
pub const ATTEMPTS_EXHAUSTED_REASON: &str =
    "Analysis was interrupted too many times and has been abandoned";

/// Result of trying to claim a job for processing.
#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    /// The caller now owns the job under this lease.
    Claimed {
        /// The fresh lease.
        lease: JobLease,
        /// The job as it is after the claim.
        job: Job,
    },
    /// The job already reached a terminal state; the delivery is stale.
    Terminal(Job),
    /// Another worker holds a live lease.
    Held(Job),
    /// The job ran out of claims and was failed by this call.
    Exhausted(Job),
    /// No such job.
    Missing,
}

/// Result of a lease-guarded write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The write was applied.
    Applied,
    /// The lease was superseded or the job is no longer running.
    Rejected,
}

impl WriteOutcome {
    /// Whether the write was applied.
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Result of the completion write.
#[derive(Debug, Clone)]
pub enum CompleteOutcome {
    /// The result was persisted and the job marked completed.
    Completed(AnalysisResult),
    /// The lease was superseded; nothing was written.
    Rejected,
}

/// Durable mapping from job id to job state.
#[async_trait]
pub trait JobStore: Send + Sync + std::fmt::Debug + 'static {
    /// Insert a new `queued` job.
    async fn create(&self, new: NewJob) -> AppResult<Job>;

    /// Find a job by id.
    async fn find_by_id(&self, id: JobId) -> AppResult<Option<Job>>;

    /// Claim a job that is `queued`, or `running` under an expired lease.
    ///
    /// A successful claim bumps `attempts` and `lease_generation`, sets the
    /// status to `running` and raises progress to at least `initial_progress`.
    async fn claim(
        &self,
        id: JobId,
        owner: &str,
        lease_ttl: Duration,
        initial_progress: f64,
    ) -> AppResult<ClaimOutcome>;

    /// Extend a lease. Returns the renewed lease, or `None` if it was lost.
    async fn renew(&self, lease: &JobLease, lease_ttl: Duration) -> AppResult<Option<JobLease>>;

    /// Raise progress. Lower values than the stored one are ignored.
    async fn record_progress(&self, lease: &JobLease, progress: f64) -> AppResult<WriteOutcome>;

    /// Persist the result and mark the job completed in one atomic step.
    async fn complete(
        &self,
        lease: &JobLease,
        result: NewAnalysisResult,
    ) -> AppResult<CompleteOutcome>;

    /// Mark a running job failed.
    async fn fail(&self, lease: &JobLease, reason: &str) -> AppResult<WriteOutcome>;

    /// Mark a job that was never claimed as failed.
    async fn fail_unclaimed(&self, id: JobId, reason: &str) -> AppResult<WriteOutcome>;

    /// Check that the store is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}

/// Read access to persisted analysis results.
#[async_trait]
pub trait AnalysisStore: Send + Sync + std::fmt::Debug + 'static {
    /// Find a result by id.
    async fn find_by_id(&self, id: AnalysisId) -> AppResult<Option<AnalysisResult>>;

    /// List results newest first.
    async fn list(
        &self,
        filter: AnalysisFilter,
        page: &PageRequest,
    ) -> AppResult<PageResponse<AnalysisResult>>;
}

/// Document records.
#[async_trait]
pub trait DocumentStore: Send + Sync + std::fmt::Debug + 'static {
    /// Record an uploaded document.
    async fn create(&self, new: NewDocument) -> AppResult<Document>;

    /// Find a document by id.
    async fn find_by_id(&self, id: DocumentId) -> AppResult<Option<Document>>;

    /// List an owner's documents newest first.
    async fn list_by_owner(
        &self,
        owner: UserId,
        page: &PageRequest,
    ) -> AppResult<PageResponse<Document>>;

    /// Delete a document record. Returns `false` if it did not exist.
    async fn delete(&self, id: DocumentId) -> AppResult<bool>;

    /// Check that the store is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}
