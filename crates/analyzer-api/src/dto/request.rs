//! Request DTOs.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/jobs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitJobRequest {
    /// Document to analyze.
    pub document_id: String,
    /// Optional analysis prompt; the configured default is used when absent
    /// or blank.
    #[serde(default)]
    pub query: Option<String>,
}

/// Query string of `GET /api/analyses`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisFilterParams {
    /// Restrict to results for one document.
    #[serde(default)]
    pub document_id: Option<String>,
}
