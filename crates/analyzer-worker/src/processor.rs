//! Processes one delivery: claim, run the pipeline, finalize.
//!
//! The store decides who owns a job. A worker that loses its lease stops
//! writing and leaves the delivery unacknowledged; the item is delivered
//! again after its visibility timeout and the next claim sorts it out.

use std::sync::Arc;

use bytes::Bytes;
use tokio::time::timeout;
use tracing::{error, info, warn};

use analyzer_cache::CacheInvalidator;
use analyzer_core::config::WorkerConfig;
use analyzer_core::error::ErrorKind;
use analyzer_core::traits::{Delivery, StorageProvider, WorkQueue};
use analyzer_core::types::AnalysisId;
use analyzer_database::{ClaimOutcome, CompleteOutcome, DocumentStore, JobStore, WriteOutcome};
use analyzer_entity::analysis::NewAnalysisResult;
use analyzer_entity::document::Document;
use analyzer_entity::job::{Job, JobLease, progress};

use crate::executor::PipelineExecutor;
use crate::heartbeat::{Heartbeat, wait_lost};
use crate::pipeline::{StepInput, StepOutput};

/// Longest failure message stored on a job.
pub const MAX_FAILURE_MESSAGE_CHARS: usize = 500;

/// What happened to a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The result was persisted.
    Completed(AnalysisId),
    /// The job was failed with this reason.
    Failed(String),
    /// The job was already terminal or gone; the delivery was dropped.
    Skipped,
    /// The job ran out of attempts and was failed during the claim.
    Exhausted,
    /// Another worker owns the job, or a store was unreachable. The
    /// delivery was left to be redelivered.
    Deferred,
    /// This worker's lease was superseded mid-run. Nothing further was written.
    LeaseLost,
}

impl ProcessOutcome {
    /// Whether the delivery was acknowledged.
    pub fn is_acknowledged(&self) -> bool {
        !matches!(self, Self::Deferred | Self::LeaseLost)
    }
}

/// Why a pipeline run ended without a summary.
enum RunError {
    /// Terminal for the job.
    Failed(String),
    /// A progress write was rejected.
    LeaseLost,
}

/// Drives jobs through their state machine.
#[derive(Debug, Clone)]
pub struct JobProcessor {
    jobs: Arc<dyn JobStore>,
    documents: Arc<dyn DocumentStore>,
    blobs: Arc<dyn StorageProvider>,
    queue: Arc<dyn WorkQueue>,
    invalidator: CacheInvalidator,
    executor: PipelineExecutor,
    config: WorkerConfig,
    worker_id: String,
}

impl JobProcessor {
    /// Creates a new processor.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        jobs: Arc<dyn JobStore>,
        documents: Arc<dyn DocumentStore>,
        blobs: Arc<dyn StorageProvider>,
        queue: Arc<dyn WorkQueue>,
        invalidator: CacheInvalidator,
        executor: PipelineExecutor,
        config: WorkerConfig,
        worker_id: impl Into<String>,
    ) -> Self {
        Self {
            jobs,
            documents,
            blobs,
            queue,
            invalidator,
            executor,
            config,
            worker_id: worker_id.into(),
        }
    }

    /// This worker's identifier, recorded as the lease owner.
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// The queue this processor acknowledges on.
    pub fn queue(&self) -> &Arc<dyn WorkQueue> {
        &self.queue
    }

    /// Worker settings.
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Process one delivery to a terminal outcome for this worker.
    pub async fn process(&self, delivery: Delivery) -> ProcessOutcome {
        let job_id = delivery.job_id;
        let claim = self
            .jobs
            .claim(job_id, &self.worker_id, self.config.lease_ttl(), progress::CLAIMED)
            .await;

        let (lease, job) = match claim {
            Ok(ClaimOutcome::Claimed { lease, job }) => (lease, job),
            Ok(ClaimOutcome::Terminal(job)) => {
                info!(job_id = %job_id, status = %job.status, "Dropping delivery for finished job");
                self.ack(&delivery).await;
                return ProcessOutcome::Skipped;
            }
            Ok(ClaimOutcome::Missing) => {
                warn!(job_id = %job_id, "Dropping delivery for unknown job");
                self.ack(&delivery).await;
                return ProcessOutcome::Skipped;
            }
            Ok(ClaimOutcome::Exhausted(job)) => {
                warn!(job_id = %job_id, attempts = job.attempts, "Job exhausted its attempts");
                self.invalidator.job_finalized(job.user_id, job.document_id).await;
                self.ack(&delivery).await;
                return ProcessOutcome::Exhausted;
            }
            Ok(ClaimOutcome::Held(job)) => {
                info!(
                    job_id = %job_id,
                    owner = job.lease_owner.as_deref().unwrap_or_default(),
                    "Job is held by another worker"
                );
                return ProcessOutcome::Deferred;
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Failed to claim job");
                return ProcessOutcome::Deferred;
            }
        };

        info!(
            job_id = %job_id,
            worker_id = %self.worker_id,
            attempt = job.attempts,
            max_attempts = job.max_attempts,
            generation = lease.generation,
            "Claimed job"
        );

        let heartbeat = Heartbeat::spawn(
            self.jobs.clone(),
            self.queue.clone(),
            lease.clone(),
            delivery.clone(),
            self.config.heartbeat_interval(),
            self.config.lease_ttl(),
        );

        let run = async {
            match self.load_document(&job).await {
                Ok(Some((document, content))) => self.run_pipeline(&lease, &job, &document, &content).await,
                Ok(None) => Err(RunError::Failed(
                    "Document unavailable: the document was deleted".to_string(),
                )),
                Err(reason) => Err(RunError::Failed(reason)),
            }
        };
        let budget = self.config.max_wall_clock();

        let result = tokio::select! {
            r = timeout(budget, run) => r.unwrap_or_else(|_| Err(RunError::Failed(format!(
                "Analysis exceeded its {}s time budget",
                budget.as_secs()
            )))),
            _ = wait_lost(heartbeat.lost()) => Err(RunError::LeaseLost),
        };
        drop(heartbeat);

        match result {
            Ok(summary) => self.finish_completed(&delivery, &lease, &job, summary).await,
            Err(RunError::Failed(reason)) => self.finish_failed(&delivery, &lease, &job, &reason).await,
            Err(RunError::LeaseLost) => {
                warn!(job_id = %job_id, "Lease lost, abandoning run");
                ProcessOutcome::LeaseLost
            }
        }
    }

    /// Load the document record and blob. `Ok(None)` when the record is gone.
    async fn load_document(&self, job: &Job) -> Result<Option<(Document, Bytes)>, String> {
        let document = match self.documents.find_by_id(job.document_id).await {
            Ok(Some(document)) => document,
            Ok(None) => return Ok(None),
            Err(e) => return Err(format!("Document unavailable: {}", e.message)),
        };
        let content = match self.blobs.read_bytes(&document.storage_path).await {
            Ok(content) => content,
            Err(e) if e.kind == ErrorKind::NotFound => {
                return Err("Document unavailable: the stored file is missing".to_string());
            }
            Err(e) => return Err(format!("Document unavailable: {}", e.message)),
        };
        if content.is_empty() {
            return Err("Document unavailable: the stored file is empty".to_string());
        }
        Ok(Some((document, content)))
    }

    async fn run_pipeline(
        &self,
        lease: &JobLease,
        job: &Job,
        document: &Document,
        content: &Bytes,
    ) -> Result<String, RunError> {
        let steps = self.executor.steps();
        let mut outputs: Vec<StepOutput> = Vec::with_capacity(steps.len());

        for (index, step) in steps.iter().enumerate() {
            let input = StepInput {
                document,
                content,
                query: &job.query,
                previous: &outputs,
            };
            let output = self
                .executor
                .run_step(step.as_ref(), &input)
                .await
                .map_err(|failure| RunError::Failed(failure.to_string()))?;
            outputs.push(StepOutput {
                step: step.name().to_string(),
                output,
            });

            let reached = progress::after_step(index, steps.len());
            match self.jobs.record_progress(lease, reached).await {
                Ok(WriteOutcome::Applied) => {}
                Ok(WriteOutcome::Rejected) => return Err(RunError::LeaseLost),
                Err(e) => warn!(job_id = %job.id, error = %e, "Failed to record progress"),
            }
        }

        let summary = outputs
            .pop()
            .map(|o| o.output.trim().to_string())
            .unwrap_or_default();
        if summary.is_empty() {
            return Err(RunError::Failed("Analysis produced an empty summary".to_string()));
        }
        Ok(summary)
    }

    async fn finish_completed(
        &self,
        delivery: &Delivery,
        lease: &JobLease,
        job: &Job,
        summary: String,
    ) -> ProcessOutcome {
        let result = NewAnalysisResult {
            document_id: job.document_id,
            user_id: job.user_id,
            query: job.query.clone(),
            summary,
        };
        match self.jobs.complete(lease, result).await {
            Ok(CompleteOutcome::Completed(result)) => {
                self.invalidator.job_finalized(job.user_id, job.document_id).await;
                self.ack(delivery).await;
                info!(job_id = %job.id, analysis_id = %result.id, "Job completed");
                ProcessOutcome::Completed(result.id)
            }
            Ok(CompleteOutcome::Rejected) => {
                warn!(job_id = %job.id, "Completion rejected, lease was superseded");
                ProcessOutcome::LeaseLost
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Failed to persist result");
                ProcessOutcome::Deferred
            }
        }
    }

    async fn finish_failed(
        &self,
        delivery: &Delivery,
        lease: &JobLease,
        job: &Job,
        reason: &str,
    ) -> ProcessOutcome {
        let reason = sanitize_failure(reason);
        match self.jobs.fail(lease, &reason).await {
            Ok(WriteOutcome::Applied) => {
                self.invalidator.job_finalized(job.user_id, job.document_id).await;
                self.ack(delivery).await;
                warn!(job_id = %job.id, reason = %reason, "Job failed");
                ProcessOutcome::Failed(reason)
            }
            Ok(WriteOutcome::Rejected) => {
                warn!(job_id = %job.id, "Failure write rejected, lease was superseded");
                ProcessOutcome::LeaseLost
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Failed to record job failure");
                ProcessOutcome::Deferred
            }
        }
    }

    async fn ack(&self, delivery: &Delivery) {
        match self.queue.ack(delivery).await {
            Ok(true) => {}
            Ok(false) => warn!(job_id = %delivery.job_id, "Delivery was already acknowledged or expired"),
            Err(e) => error!(job_id = %delivery.job_id, error = %e, "Failed to acknowledge delivery"),
        }
    }
}

/// First line only, control characters removed, length bounded.
pub fn sanitize_failure(reason: &str) -> String {
    let line: String = reason
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("Analysis failed")
        .chars()
        .filter(|c| !c.is_control())
        .collect();
    if line.chars().count() <= MAX_FAILURE_MESSAGE_CHARS {
        return line;
    }
    let mut bounded: String = line.chars().take(MAX_FAILURE_MESSAGE_CHARS - 3).collect();
    bounded.push_str("...");
    bounded
}
