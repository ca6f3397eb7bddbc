//! Cache key builders for every cached read model.
//!
//! Keys are derived from (resource kind, resource id or filter, owning
//! user). Listing and document detail keys also carry the owner's scope
//! epoch so that bumping the epoch orphans every such entry cached before
//! the bump. The Redis provider adds its own global prefix.

use analyzer_core::types::{AnalysisId, DocumentId, UserId};

// ── Scope epochs ───────────────────────────────────────────

/// Counter bumped whenever an owner's scoped entries must be dropped.
pub fn scope_epoch(user_id: UserId) -> String {
    format!("epoch:{user_id}")
}

// ── Document keys ──────────────────────────────────────────

/// Cache key for one page of an owner's document listing.
pub fn document_list(user_id: UserId, epoch: i64, page: u64, page_size: u64) -> String {
    format!("docs:list:{user_id}:e{epoch}:p{page}:s{page_size}")
}

/// Pattern matching every document listing of an owner.
pub fn document_list_pattern(user_id: UserId) -> String {
    format!("docs:list:{user_id}:*")
}

/// Cache key for a document detail view.
pub fn document_detail(user_id: UserId, epoch: i64, document_id: DocumentId) -> String {
    format!("docs:get:{user_id}:e{epoch}:{document_id}")
}

/// Pattern matching a document's detail view under every epoch.
pub fn document_detail_pattern(user_id: UserId, document_id: DocumentId) -> String {
    format!("docs:get:{user_id}:*:{document_id}")
}

// ── Analysis keys ──────────────────────────────────────────

/// Cache key for one page of an owner's analysis listing.
pub fn analysis_list(
    user_id: UserId,
    epoch: i64,
    document_id: Option<DocumentId>,
    page: u64,
    page_size: u64,
) -> String {
    let scope = document_id.map_or_else(|| "all".to_string(), |id| id.to_string());
    format!("analyses:list:{user_id}:e{epoch}:{scope}:p{page}:s{page_size}")
}

/// Pattern matching every analysis listing of an owner.
pub fn analysis_list_pattern(user_id: UserId) -> String {
    format!("analyses:list:{user_id}:*")
}

/// Cache key for an analysis result detail view.
pub fn analysis_detail(user_id: UserId, analysis_id: AnalysisId) -> String {
    format!("analyses:get:{user_id}:{analysis_id}")
}

// ── Rate limiting keys ─────────────────────────────────────

/// Cache key for a fixed-window rate limit counter.
pub fn rate_limit(route_class: &str, identity: &str, window: u64) -> String {
    format!("rate:{route_class}:{identity}:{window}")
}
