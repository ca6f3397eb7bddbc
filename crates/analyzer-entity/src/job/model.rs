//! Job entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use analyzer_core::types::{AnalysisId, DocumentId, JobId, UserId};

use super::status::JobStatus;

/// One asynchronous analysis request and its lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    /// Unique job identifier.
    pub id: JobId,
    /// Owning user.
    pub user_id: UserId,
    /// Source document.
    pub document_id: DocumentId,
    /// Analysis prompt.
    pub query: String,
    /// Current status.
    pub status: JobStatus,
    /// Progress fraction in `[0, 1]`. Never decreases.
    pub progress: f64,
    /// Result reference, set only on completion.
    pub analysis_id: Option<AnalysisId>,
    /// Sanitized failure reason, set only on failure.
    pub error_message: Option<String>,
    /// Number of claims taken so far.
    pub attempts: i32,
    /// Claims allowed before the job is failed instead of reclaimed.
    pub max_attempts: i32,
    /// Generation of the most recent claim.
    pub lease_generation: i64,
    /// Worker holding the current lease.
    pub lease_owner: Option<String>,
    /// When the current lease lapses.
    pub lease_expires_at: Option<DateTime<Utc>>,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the job was last updated.
    pub updated_at: DateTime<Utc>,
    /// When the first claim happened.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Build a fresh `queued` record.
    pub fn new(new: NewJob) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            user_id: new.user_id,
            document_id: new.document_id,
            query: new.query,
            status: JobStatus::Queued,
            progress: 0.0,
            analysis_id: None,
            error_message: None,
            attempts: 0,
            max_attempts: new.max_attempts,
            lease_generation: 0,
            lease_owner: None,
            lease_expires_at: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            finished_at: None,
        }
    }

    /// Whether the given user owns this job.
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }

    /// Whether another claim is still allowed.
    pub fn has_attempts_left(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Whether a live lease blocks a new claim at `now`.
    pub fn is_leased_at(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Running
            && self.lease_expires_at.is_some_and(|expires| expires > now)
    }

    /// Client-facing view of this job.
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.id,
            document_id: self.document_id,
            query: self.query.clone(),
            status: self.status,
            progress: self.progress,
            analysis_result_ref: self.analysis_id,
            error: self.error_message.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Data required to create a new job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJob {
    /// Owning user.
    pub user_id: UserId,
    /// Source document.
    pub document_id: DocumentId,
    /// Validated query text.
    pub query: String,
    /// Claims allowed before giving up.
    pub max_attempts: i32,
}

/// The status view returned to pollers.
///
/// Completed and failed jobs share this shape; only `status`, `error` and
/// `analysis_result_ref` differ, and all fields are always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Job identifier.
    pub job_id: JobId,
    /// Source document.
    pub document_id: DocumentId,
    /// Analysis prompt.
    pub query: String,
    /// Current status.
    pub status: JobStatus,
    /// Progress fraction in `[0, 1]`.
    pub progress: f64,
    /// Result reference once completed.
    pub analysis_result_ref: Option<AnalysisId>,
    /// Failure reason once failed.
    pub error: Option<String>,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the job was last updated.
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample() -> Job {
        Job::new(NewJob {
            user_id: UserId::new(),
            document_id: DocumentId::new(),
            query: "Summarize revenue".to_string(),
            max_attempts: 3,
        })
    }

    #[test]
    fn test_new_job_is_queued_at_zero() {
        let job = sample();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, 0.0);
        assert_eq!(job.lease_generation, 0);
        assert!(job.has_attempts_left());
    }

    #[test]
    fn test_lease_blocks_only_while_running_and_unexpired() {
        let now = Utc::now();
        let mut job = sample();
        job.lease_expires_at = Some(now + Duration::seconds(30));
        assert!(!job.is_leased_at(now));
        job.status = JobStatus::Running;
        assert!(job.is_leased_at(now));
        assert!(!job.is_leased_at(now + Duration::seconds(31)));
    }

    #[test]
    fn test_snapshot_keeps_null_fields() {
        let json = serde_json::to_value(sample().snapshot()).expect("serialize");
        assert!(json.get("analysis_result_ref").is_some_and(|v| v.is_null()));
        assert!(json.get("error").is_some_and(|v| v.is_null()));
        assert_eq!(json["status"], "queued");
    }
}
