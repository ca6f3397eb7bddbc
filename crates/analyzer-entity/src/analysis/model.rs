//! Analysis result entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use analyzer_core::types::{AnalysisId, DocumentId, JobId, UserId};

/// The output of a completed job. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AnalysisResult {
    /// Unique result identifier, distinct from the job id.
    pub id: AnalysisId,
    /// Job that produced this result.
    pub job_id: JobId,
    /// Source document.
    pub document_id: DocumentId,
    /// Owning user.
    pub user_id: UserId,
    /// Query the analysis answered.
    pub query: String,
    /// Produced textual summary.
    pub summary: String,
    /// When the result was persisted.
    pub created_at: DateTime<Utc>,
}

/// Result content produced by a pipeline run, before persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAnalysisResult {
    /// Source document.
    pub document_id: DocumentId,
    /// Owning user.
    pub user_id: UserId,
    /// Query the analysis answered.
    pub query: String,
    /// Produced textual summary.
    pub summary: String,
}

/// Listing filter for analysis results. Always scoped to an owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisFilter {
    /// Owning user.
    pub user_id: UserId,
    /// Restrict to one source document.
    pub document_id: Option<DocumentId>,
}
