//! Claim token held by the worker that owns a running job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use analyzer_core::types::JobId;

/// A time-bounded right to write a job's progress and terminal state.
///
/// Every successful claim bumps the job's lease generation. Writes carry
/// `(job_id, generation)` and are accepted only while the stored
/// generation still matches and the job is `running`, so a superseded
/// worker can never overwrite its successor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLease {
    /// The claimed job.
    pub job_id: JobId,
    /// Monotonic claim counter for the job.
    pub generation: i64,
    /// Worker that holds the lease.
    pub owner: String,
    /// When the lease lapses unless renewed.
    pub expires_at: DateTime<Utc>,
}

impl JobLease {
    /// Whether the lease has lapsed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
