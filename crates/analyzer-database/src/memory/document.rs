//! In-memory document store.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use analyzer_core::result::AppResult;
use analyzer_core::types::{DocumentId, PageRequest, PageResponse, UserId};
use analyzer_entity::document::{Document, NewDocument};

use crate::store::DocumentStore;

/// Document records kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: DashMap<DocumentId, Document>,
}

impl MemoryDocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create(&self, new: NewDocument) -> AppResult<Document> {
        let document = Document {
            id: new.id,
            owner_id: new.owner_id,
            filename: new.filename,
            content_type: new.content_type,
            size_bytes: new.size_bytes,
            storage_path: new.storage_path,
            created_at: Utc::now(),
        };
        self.documents.insert(document.id, document.clone());
        Ok(document)
    }

    async fn find_by_id(&self, id: DocumentId) -> AppResult<Option<Document>> {
        Ok(self.documents.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list_by_owner(
        &self,
        owner: UserId,
        page: &PageRequest,
    ) -> AppResult<PageResponse<Document>> {
        let mut items: Vec<Document> = self
            .documents
            .iter()
            .filter(|entry| entry.owner_id == owner)
            .map(|entry| entry.value().clone())
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = items.len() as u64;
        let items = items
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Ok(PageResponse::new(items, page.page, page.page_size, total))
    }

    async fn delete(&self, id: DocumentId) -> AppResult<bool> {
        Ok(self.documents.remove(&id).is_some())
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}
