//! Job repository implementation.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use analyzer_core::error::{AppError, ErrorKind};
use analyzer_core::result::AppResult;
use analyzer_core::types::{AnalysisId, JobId};
use analyzer_entity::analysis::{AnalysisResult, NewAnalysisResult};
use analyzer_entity::job::{Job, JobLease, JobStatus, NewJob};

use crate::store::{
    ATTEMPTS_EXHAUSTED_REASON, ClaimOutcome, CompleteOutcome, JobStore, WriteOutcome,
};

/// PostgreSQL-backed job record store.
#[derive(Debug, Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    /// Create a new job repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fail a job whose claims are used up, unless someone holds a live lease.
    async fn fail_exhausted(&self, id: JobId) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>(
            "UPDATE jobs SET status = 'failed', error_message = $2, finished_at = NOW(), \
             lease_owner = NULL, lease_expires_at = NULL, updated_at = NOW() \
             WHERE id = $1 AND attempts >= max_attempts \
             AND (status = 'queued' OR (status = 'running' AND lease_expires_at <= NOW())) \
             RETURNING *",
        )
        .bind(id)
        .bind(ATTEMPTS_EXHAUSTED_REASON)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to fail exhausted job", e))
    }
}

fn lease_seconds(ttl: Duration) -> f64 {
    ttl.as_secs_f64()
}

fn lease_from(job: &Job) -> AppResult<JobLease> {
    let (Some(owner), Some(expires_at)) = (job.lease_owner.clone(), job.lease_expires_at) else {
        return Err(AppError::database(format!(
            "Claimed job {} has no lease columns",
            job.id
        )));
    };
    Ok(JobLease {
        job_id: job.id,
        generation: job.lease_generation,
        owner,
        expires_at,
    })
}

#[async_trait]
impl JobStore for JobRepository {
    async fn create(&self, new: NewJob) -> AppResult<Job> {
        let job = Job::new(new);
        sqlx::query_as::<_, Job>(
            "INSERT INTO jobs (id, user_id, document_id, query, status, progress, attempts, \
             max_attempts, lease_generation, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, 'queued', 0, 0, $5, 0, $6, $6) RETURNING *",
        )
        .bind(job.id)
        .bind(job.user_id)
        .bind(job.document_id)
        .bind(&job.query)
        .bind(job.max_attempts)
        .bind(job.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create job", e))
    }

    async fn find_by_id(&self, id: JobId) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find job", e))
    }

    async fn claim(
        &self,
        id: JobId,
        owner: &str,
        lease_ttl: Duration,
        initial_progress: f64,
    ) -> AppResult<ClaimOutcome> {
        let claimed = sqlx::query_as::<_, Job>(
            "UPDATE jobs SET status = 'running', attempts = attempts + 1, \
             lease_generation = lease_generation + 1, lease_owner = $2, \
             lease_expires_at = NOW() + make_interval(secs => $3), \
             progress = GREATEST(progress, $4), started_at = COALESCE(started_at, NOW()), \
             updated_at = NOW() \
             WHERE id = $1 AND attempts < max_attempts \
             AND (status = 'queued' OR (status = 'running' AND lease_expires_at <= NOW())) \
             RETURNING *",
        )
        .bind(id)
        .bind(owner)
        .bind(lease_seconds(lease_ttl))
        .bind(initial_progress)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to claim job", e))?;

        if let Some(job) = claimed {
            let lease = lease_from(&job)?;
            return Ok(ClaimOutcome::Claimed { lease, job });
        }

        if let Some(job) = self.fail_exhausted(id).await? {
            return Ok(ClaimOutcome::Exhausted(job));
        }

        let Some(job) = self.find_by_id(id).await? else {
            return Ok(ClaimOutcome::Missing);
        };
        if job.status.is_terminal() {
            Ok(ClaimOutcome::Terminal(job))
        } else {
            Ok(ClaimOutcome::Held(job))
        }
    }

    async fn renew(&self, lease: &JobLease, lease_ttl: Duration) -> AppResult<Option<JobLease>> {
        let expires_at: Option<DateTime<Utc>> = sqlx::query_scalar(
            "UPDATE jobs SET lease_expires_at = NOW() + make_interval(secs => $3), updated_at = NOW() \
             WHERE id = $1 AND lease_generation = $2 AND status = 'running' \
             RETURNING lease_expires_at",
        )
        .bind(lease.job_id)
        .bind(lease.generation)
        .bind(lease_seconds(lease_ttl))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to renew lease", e))?;

        Ok(expires_at.map(|expires_at| JobLease {
            expires_at,
            ..lease.clone()
        }))
    }

    async fn record_progress(&self, lease: &JobLease, progress: f64) -> AppResult<WriteOutcome> {
        let result = sqlx::query(
            "UPDATE jobs SET progress = GREATEST(progress, $3), updated_at = NOW() \
             WHERE id = $1 AND lease_generation = $2 AND status = 'running'",
        )
        .bind(lease.job_id)
        .bind(lease.generation)
        .bind(progress)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to record progress", e))?;

        Ok(if result.rows_affected() == 1 {
            WriteOutcome::Applied
        } else {
            WriteOutcome::Rejected
        })
    }

    async fn complete(
        &self,
        lease: &JobLease,
        result: NewAnalysisResult,
    ) -> AppResult<CompleteOutcome> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let held: Option<JobId> = sqlx::query_scalar(
            "SELECT id FROM jobs WHERE id = $1 AND lease_generation = $2 AND status = 'running' \
             FOR UPDATE",
        )
        .bind(lease.job_id)
        .bind(lease.generation)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to lock job", e))?;

        if held.is_none() {
            return Ok(CompleteOutcome::Rejected);
        }

        let analysis = sqlx::query_as::<_, AnalysisResult>(
            "INSERT INTO analysis_results (id, job_id, document_id, user_id, query, summary) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(AnalysisId::new())
        .bind(lease.job_id)
        .bind(result.document_id)
        .bind(result.user_id)
        .bind(&result.query)
        .bind(&result.summary)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to insert analysis result", e)
        })?;

        sqlx::query(
            "UPDATE jobs SET status = 'completed', progress = 1.0, analysis_id = $2, \
             finished_at = NOW(), lease_owner = NULL, lease_expires_at = NULL, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(lease.job_id)
        .bind(analysis.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to complete job", e))?;

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit completion", e)
        })?;

        Ok(CompleteOutcome::Completed(analysis))
    }

    async fn fail(&self, lease: &JobLease, reason: &str) -> AppResult<WriteOutcome> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'failed', error_message = $3, finished_at = NOW(), \
             lease_owner = NULL, lease_expires_at = NULL, updated_at = NOW() \
             WHERE id = $1 AND lease_generation = $2 AND status = 'running'",
        )
        .bind(lease.job_id)
        .bind(lease.generation)
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to mark job as failed", e))?;

        Ok(if result.rows_affected() == 1 {
            WriteOutcome::Applied
        } else {
            WriteOutcome::Rejected
        })
    }

    async fn fail_unclaimed(&self, id: JobId, reason: &str) -> AppResult<WriteOutcome> {
        let result = sqlx::query(
            "UPDATE jobs SET status = $2, error_message = $3, finished_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status = 'queued'",
        )
        .bind(id)
        .bind(JobStatus::Failed)
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to mark job as failed", e))?;

        Ok(if result.rows_affected() == 1 {
            WriteOutcome::Applied
        } else {
            WriteOutcome::Rejected
        })
    }

    async fn health_check(&self) -> AppResult<bool> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|v| v == 1)
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Health check failed", e))
    }
}
