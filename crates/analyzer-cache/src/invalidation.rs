//! Eager cache invalidation for mutations of documents and analyses.

use tracing::{debug, warn};

use analyzer_core::types::{DocumentId, UserId};

use crate::keys;
use crate::read_through::ReadThroughCache;

/// Removes cached read models affected by a mutation.
///
/// Each hook bumps the owner's scope epoch first, so listings and document
/// details loaded concurrently with the mutation are written under a key
/// nobody reads again, and then deletes the affected entries outright. Failures are
/// logged; entries left behind by an unreachable cache expire by TTL.
#[derive(Debug, Clone)]
pub struct CacheInvalidator {
    cache: ReadThroughCache,
}

impl CacheInvalidator {
    /// Create an invalidator over the given cache.
    pub fn new(cache: ReadThroughCache) -> Self {
        Self { cache }
    }

    /// A document was deleted: drop its detail view and all of the owner's
    /// document and analysis listings.
    pub async fn document_deleted(&self, owner: UserId, document_id: DocumentId) {
        self.bump_epoch(owner).await;
        self.delete_pattern(&keys::document_detail_pattern(owner, document_id)).await;
        self.delete_pattern(&keys::document_list_pattern(owner)).await;
        self.delete_pattern(&keys::analysis_list_pattern(owner)).await;
        debug!(owner = %owner, document_id = %document_id, "Invalidated caches for deleted document");
    }

    /// A job on this document reached a terminal state.
    pub async fn job_finalized(&self, owner: UserId, document_id: DocumentId) {
        self.bump_epoch(owner).await;
        self.delete_pattern(&keys::document_detail_pattern(owner, document_id)).await;
        self.delete_pattern(&keys::document_list_pattern(owner)).await;
        self.delete_pattern(&keys::analysis_list_pattern(owner)).await;
        debug!(owner = %owner, document_id = %document_id, "Invalidated caches for finalized job");
    }

    /// A document was uploaded: only listings are affected.
    pub async fn document_created(&self, owner: UserId) {
        self.bump_epoch(owner).await;
        self.delete_pattern(&keys::document_list_pattern(owner)).await;
    }

    async fn bump_epoch(&self, owner: UserId) {
        if let Err(e) = self.cache.bump_scope_epoch(owner).await {
            warn!(owner = %owner, error = %e, "Failed to bump scope epoch");
        }
    }

    async fn delete_pattern(&self, pattern: &str) {
        if let Err(e) = self.cache.invalidate(pattern).await {
            warn!(pattern, error = %e, "Failed to invalidate cache pattern");
        }
    }
}
