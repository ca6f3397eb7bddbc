//! In-memory job record store.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use analyzer_core::result::AppResult;
use analyzer_core::types::{AnalysisId, DocumentId, JobId, PageRequest, PageResponse};
use analyzer_entity::analysis::{AnalysisFilter, AnalysisResult, NewAnalysisResult};
use analyzer_entity::job::{Job, JobLease, JobStatus, NewJob};

use super::to_chrono;
use crate::store::{
    ATTEMPTS_EXHAUSTED_REASON, AnalysisStore, ClaimOutcome, CompleteOutcome, JobStore,
    WriteOutcome,
};

/// Job and analysis-result store kept in process memory.
///
/// Each write locks the job's map shard for its whole check-and-update,
/// which gives the same atomicity as the conditional SQL updates.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: DashMap<JobId, Job>,
    results: DashMap<AnalysisId, AnalysisResult>,
}

impl MemoryJobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded jobs.
    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Number of persisted analysis results.
    pub fn result_count(&self) -> usize {
        self.results.len()
    }

    /// Every job recorded for a document, oldest first.
    pub fn jobs_for_document(&self, document_id: DocumentId) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .jobs
            .iter()
            .filter(|entry| entry.document_id == document_id)
            .map(|entry| entry.value().clone())
            .collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }

    fn guarded_write(
        &self,
        lease: &JobLease,
        write: impl FnOnce(&mut Job),
    ) -> WriteOutcome {
        match self.jobs.get_mut(&lease.job_id) {
            Some(mut entry) if holds(&entry, lease) => {
                let job = entry.value_mut();
                write(job);
                job.updated_at = Utc::now();
                WriteOutcome::Applied
            }
            _ => WriteOutcome::Rejected,
        }
    }
}

fn holds(job: &Job, lease: &JobLease) -> bool {
    job.status == JobStatus::Running && job.lease_generation == lease.generation
}

fn release(job: &mut Job) {
    let now = Utc::now();
    job.lease_owner = None;
    job.lease_expires_at = None;
    job.finished_at = Some(now);
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, new: NewJob) -> AppResult<Job> {
        let job = Job::new(new);
        self.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn find_by_id(&self, id: JobId) -> AppResult<Option<Job>> {
        Ok(self.jobs.get(&id).map(|entry| entry.value().clone()))
    }

    async fn claim(
        &self,
        id: JobId,
        owner: &str,
        lease_ttl: Duration,
        initial_progress: f64,
    ) -> AppResult<ClaimOutcome> {
        let ttl = to_chrono(lease_ttl)?;
        let Some(mut entry) = self.jobs.get_mut(&id) else {
            return Ok(ClaimOutcome::Missing);
        };
        let job = entry.value_mut();
        let now = Utc::now();

        if job.status.is_terminal() {
            return Ok(ClaimOutcome::Terminal(job.clone()));
        }
        if job.is_leased_at(now) {
            return Ok(ClaimOutcome::Held(job.clone()));
        }
        if !job.has_attempts_left() {
            job.status = JobStatus::Failed;
            job.error_message = Some(ATTEMPTS_EXHAUSTED_REASON.to_string());
            job.updated_at = now;
            release(job);
            return Ok(ClaimOutcome::Exhausted(job.clone()));
        }

        job.status = JobStatus::Running;
        job.attempts += 1;
        job.lease_generation += 1;
        job.lease_owner = Some(owner.to_string());
        job.lease_expires_at = Some(now + ttl);
        job.progress = job.progress.max(initial_progress);
        job.started_at.get_or_insert(now);
        job.updated_at = now;

        let lease = JobLease {
            job_id: job.id,
            generation: job.lease_generation,
            owner: owner.to_string(),
            expires_at: now + ttl,
        };
        Ok(ClaimOutcome::Claimed {
            lease,
            job: job.clone(),
        })
    }

    async fn renew(&self, lease: &JobLease, lease_ttl: Duration) -> AppResult<Option<JobLease>> {
        let expires_at = Utc::now() + to_chrono(lease_ttl)?;
        let outcome = self.guarded_write(lease, |job| job.lease_expires_at = Some(expires_at));
        Ok(outcome.is_applied().then(|| JobLease {
            expires_at,
            ..lease.clone()
        }))
    }

    async fn record_progress(&self, lease: &JobLease, progress: f64) -> AppResult<WriteOutcome> {
        Ok(self.guarded_write(lease, |job| job.progress = job.progress.max(progress)))
    }

    async fn complete(
        &self,
        lease: &JobLease,
        result: NewAnalysisResult,
    ) -> AppResult<CompleteOutcome> {
        let Some(mut entry) = self.jobs.get_mut(&lease.job_id) else {
            return Ok(CompleteOutcome::Rejected);
        };
        if !holds(&entry, lease) {
            return Ok(CompleteOutcome::Rejected);
        }

        let analysis = AnalysisResult {
            id: AnalysisId::new(),
            job_id: lease.job_id,
            document_id: result.document_id,
            user_id: result.user_id,
            query: result.query,
            summary: result.summary,
            created_at: Utc::now(),
        };
        self.results.insert(analysis.id, analysis.clone());

        let job = entry.value_mut();
        job.status = JobStatus::Completed;
        job.progress = 1.0;
        job.analysis_id = Some(analysis.id);
        job.updated_at = analysis.created_at;
        release(job);

        Ok(CompleteOutcome::Completed(analysis))
    }

    async fn fail(&self, lease: &JobLease, reason: &str) -> AppResult<WriteOutcome> {
        Ok(self.guarded_write(lease, |job| {
            job.status = JobStatus::Failed;
            job.error_message = Some(reason.to_string());
            release(job);
        }))
    }

    async fn fail_unclaimed(&self, id: JobId, reason: &str) -> AppResult<WriteOutcome> {
        match self.jobs.get_mut(&id) {
            Some(mut entry) if entry.status == JobStatus::Queued => {
                let job = entry.value_mut();
                job.status = JobStatus::Failed;
                job.error_message = Some(reason.to_string());
                job.updated_at = Utc::now();
                release(job);
                Ok(WriteOutcome::Applied)
            }
            _ => Ok(WriteOutcome::Rejected),
        }
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}

#[async_trait]
impl AnalysisStore for MemoryJobStore {
    async fn find_by_id(&self, id: AnalysisId) -> AppResult<Option<AnalysisResult>> {
        Ok(self.results.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list(
        &self,
        filter: AnalysisFilter,
        page: &PageRequest,
    ) -> AppResult<PageResponse<AnalysisResult>> {
        let mut items: Vec<AnalysisResult> = self
            .results
            .iter()
            .filter(|entry| {
                entry.user_id == filter.user_id
                    && filter.document_id.is_none_or(|doc| entry.document_id == doc)
            })
            .map(|entry| entry.value().clone())
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = items.len() as u64;
        let items = items
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Ok(PageResponse::new(items, page.page, page.page_size, total))
    }
}
