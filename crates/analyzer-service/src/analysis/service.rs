//! Cached, owner-scoped reads of analysis results.

use std::sync::Arc;

use analyzer_cache::{ReadThroughCache, TtlClass, keys};
use analyzer_core::error::AppError;
use analyzer_core::result::AppResult;
use analyzer_core::types::{AnalysisId, DocumentId, PageRequest, PageResponse};
use analyzer_database::AnalysisStore;
use analyzer_entity::analysis::{AnalysisFilter, AnalysisResult};

use crate::context::RequestContext;

/// Serves analysis results. Results are immutable, so detail views are
/// cached with the long TTL.
#[derive(Debug, Clone)]
pub struct AnalysisService {
    analyses: Arc<dyn AnalysisStore>,
    cache: ReadThroughCache,
}

impl AnalysisService {
    /// Creates a new analysis service.
    pub fn new(analyses: Arc<dyn AnalysisStore>, cache: ReadThroughCache) -> Self {
        Self { analyses, cache }
    }

    /// Lists the caller's results, newest first, optionally for one document.
    pub async fn list(
        &self,
        ctx: &RequestContext,
        document_id: Option<DocumentId>,
        page: PageRequest,
    ) -> AppResult<PageResponse<AnalysisResult>> {
        let page = page.normalized();
        let owner = ctx.user_id;
        let filter = AnalysisFilter {
            user_id: owner,
            document_id,
        };
        self.cache
            .get_or_load_listing(
                owner,
                |epoch| keys::analysis_list(owner, epoch, document_id, page.page, page.page_size),
                || async { self.analyses.list(filter, &page).await },
            )
            .await
    }

    /// Gets one of the caller's results.
    pub async fn get(&self, ctx: &RequestContext, id: AnalysisId) -> AppResult<AnalysisResult> {
        let owner = ctx.user_id;
        self.cache
            .get_or_load(&keys::analysis_detail(owner, id), TtlClass::Detail, || async {
                self.analyses
                    .find_by_id(id)
                    .await?
                    .filter(|r| r.user_id == owner)
                    .ok_or_else(|| AppError::not_found("Analysis result not found"))
            })
            .await
    }
}
