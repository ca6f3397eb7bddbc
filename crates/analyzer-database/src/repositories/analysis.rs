//! Analysis result repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;

use analyzer_core::error::{AppError, ErrorKind};
use analyzer_core::result::AppResult;
use analyzer_core::types::{AnalysisId, PageRequest, PageResponse};
use analyzer_entity::analysis::{AnalysisFilter, AnalysisResult};

use crate::store::AnalysisStore;

/// Read-only repository over persisted analysis results.
///
/// Results are written by [`super::JobRepository::complete`] inside the
/// same transaction that finalizes the job.
#[derive(Debug, Clone)]
pub struct AnalysisRepository {
    pool: PgPool,
}

impl AnalysisRepository {
    /// Create a new analysis repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnalysisStore for AnalysisRepository {
    async fn find_by_id(&self, id: AnalysisId) -> AppResult<Option<AnalysisResult>> {
        sqlx::query_as::<_, AnalysisResult>("SELECT * FROM analysis_results WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to find analysis result", e)
            })
    }

    async fn list(
        &self,
        filter: AnalysisFilter,
        page: &PageRequest,
    ) -> AppResult<PageResponse<AnalysisResult>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM analysis_results \
             WHERE user_id = $1 AND ($2::uuid IS NULL OR document_id = $2)",
        )
        .bind(filter.user_id)
        .bind(filter.document_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to count analysis results", e)
        })?;

        let items = sqlx::query_as::<_, AnalysisResult>(
            "SELECT * FROM analysis_results \
             WHERE user_id = $1 AND ($2::uuid IS NULL OR document_id = $2) \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4",
        )
        .bind(filter.user_id)
        .bind(filter.document_id)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list analysis results", e)
        })?;

        Ok(PageResponse::new(
            items,
            page.page,
            page.page_size,
            total as u64,
        ))
    }
}
