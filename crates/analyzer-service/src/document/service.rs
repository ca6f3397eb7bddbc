//! Document upload, listing, retrieval and deletion.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use analyzer_cache::{CacheInvalidator, ReadThroughCache, TtlClass, keys};
use analyzer_core::config::StorageConfig;
use analyzer_core::error::AppError;
use analyzer_core::result::AppResult;
use analyzer_core::traits::StorageProvider;
use analyzer_core::types::{DocumentId, PageRequest, PageResponse};
use analyzer_database::DocumentStore;
use analyzer_entity::document::{Document, NewDocument};
use analyzer_storage::pdf::{self, PDF_CONTENT_TYPE, PdfError};

use crate::context::RequestContext;

/// An upload as received from the transport layer.
#[derive(Debug, Clone)]
pub struct UploadDocument {
    /// Original file name.
    pub filename: String,
    /// Declared content type.
    pub content_type: String,
    /// File contents.
    pub data: Bytes,
}

/// Manages documents and their blobs, with cached reads.
#[derive(Debug, Clone)]
pub struct DocumentService {
    /// Document records.
    documents: Arc<dyn DocumentStore>,
    /// Blob store.
    blobs: Arc<dyn StorageProvider>,
    /// Read-through cache for listings and details.
    cache: ReadThroughCache,
    /// Eager invalidation on mutation.
    invalidator: CacheInvalidator,
    /// Upload limits.
    config: StorageConfig,
}

impl DocumentService {
    /// Creates a new document service.
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        blobs: Arc<dyn StorageProvider>,
        cache: ReadThroughCache,
        config: StorageConfig,
    ) -> Self {
        Self {
            documents,
            blobs,
            invalidator: CacheInvalidator::new(cache.clone()),
            cache,
            config,
        }
    }

    /// Stores the blob, then records the document.
    ///
    /// PDFs must carry the `%PDF-` header and yield some text; nothing is
    /// stored for an upload that fails either check.
    pub async fn upload(&self, ctx: &RequestContext, upload: UploadDocument) -> AppResult<Document> {
        self.validate_upload(&upload)?;
        preflight_pdf(&upload).await?;

        let id = DocumentId::new();
        let storage_path = analyzer_storage::document_path(ctx.user_id, id);
        let size_bytes = upload.data.len() as i64;
        self.blobs.write(&storage_path, upload.data).await?;

        let created = self
            .documents
            .create(NewDocument {
                id,
                owner_id: ctx.user_id,
                filename: upload.filename,
                content_type: upload.content_type,
                size_bytes,
                storage_path: storage_path.clone(),
            })
            .await;

        let document = match created {
            Ok(document) => document,
            Err(e) => {
                if let Err(cleanup) = self.blobs.delete(&storage_path).await {
                    warn!(path = %storage_path, error = %cleanup, "Failed to remove orphaned blob");
                }
                return Err(e);
            }
        };

        self.invalidator.document_created(ctx.user_id).await;
        info!(
            document_id = %document.id,
            user_id = %ctx.user_id,
            size_bytes,
            "Document uploaded"
        );
        Ok(document)
    }

    /// Lists the caller's documents, newest first.
    pub async fn list(
        &self,
        ctx: &RequestContext,
        page: PageRequest,
    ) -> AppResult<PageResponse<Document>> {
        let page = page.normalized();
        let owner = ctx.user_id;
        self.cache
            .get_or_load_listing(
                owner,
                |epoch| keys::document_list(owner, epoch, page.page, page.page_size),
                || async { self.documents.list_by_owner(owner, &page).await },
            )
            .await
    }

    /// Gets one of the caller's documents.
    pub async fn get(&self, ctx: &RequestContext, id: DocumentId) -> AppResult<Document> {
        let owner = ctx.user_id;
        self.cache
            .get_or_load_scoped(
                owner,
                TtlClass::Detail,
                |epoch| keys::document_detail(owner, epoch, id),
                || async { self.find_owned(ctx, id).await },
            )
            .await
    }

    /// Deletes a document record and its blob.
    ///
    /// Jobs and analysis results referring to the document are kept. Cached
    /// views of the document are removed before this returns.
    pub async fn delete(&self, ctx: &RequestContext, id: DocumentId) -> AppResult<()> {
        let document = self.find_owned(ctx, id).await?;

        if !self.documents.delete(id).await? {
            return Err(AppError::not_found("Document not found"));
        }
        if let Err(e) = self.blobs.delete(&document.storage_path).await {
            warn!(document_id = %id, error = %e, "Failed to delete document blob");
        }

        self.invalidator.document_deleted(ctx.user_id, id).await;
        info!(document_id = %id, user_id = %ctx.user_id, "Document deleted");
        Ok(())
    }

    async fn find_owned(&self, ctx: &RequestContext, id: DocumentId) -> AppResult<Document> {
        self.documents
            .find_by_id(id)
            .await?
            .filter(|d| d.is_owned_by(ctx.user_id))
            .ok_or_else(|| AppError::not_found("Document not found"))
    }

    fn validate_upload(&self, upload: &UploadDocument) -> AppResult<()> {
        if upload.filename.trim().is_empty() {
            return Err(AppError::validation("File name is required"));
        }
        if upload.data.is_empty() {
            return Err(AppError::validation("Uploaded file is empty"));
        }
        if upload.data.len() as u64 > self.config.max_upload_size_bytes {
            return Err(AppError::validation(format!(
                "File exceeds the {} byte upload limit",
                self.config.max_upload_size_bytes
            )));
        }
        let essence = media_essence(&upload.content_type);
        if !self
            .config
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&essence))
        {
            return Err(AppError::unsupported_media_type(format!(
                "Content type '{essence}' is not accepted"
            )));
        }
        Ok(())
    }
}

fn media_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Rejects mislabelled PDFs and PDFs whose text cannot be read.
async fn preflight_pdf(upload: &UploadDocument) -> AppResult<()> {
    if media_essence(&upload.content_type) != PDF_CONTENT_TYPE {
        return Ok(());
    }
    if !pdf::has_pdf_header(&upload.data) {
        return Err(AppError::unsupported_media_type(
            "Invalid file format: only PDF files are accepted as application/pdf",
        ));
    }

    let data = upload.data.clone();
    let checked = tokio::task::spawn_blocking(move || pdf::extract_text(&data))
        .await
        .map_err(|e| AppError::internal(format!("PDF preflight aborted: {e}")))?;

    match checked {
        Ok(_) => Ok(()),
        Err(PdfError::NoText) => Err(AppError::unprocessable_document(
            "Scanned or image-only PDF detected; OCR is not supported",
        )),
        Err(e) => {
            debug!(filename = %upload.filename, error = %e, "PDF preflight failed");
            Err(AppError::unprocessable_document(
                "PDF is corrupted or password-protected",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use analyzer_cache::memory::MemoryCacheProvider;
    use analyzer_core::config::MemoryCacheConfig;
    use analyzer_core::error::ErrorKind;
    use analyzer_core::types::UserId;
    use analyzer_database::memory::MemoryDocumentStore;
    use analyzer_storage::MemoryStorageProvider;

    use super::*;

    fn service() -> (DocumentService, Arc<MemoryStorageProvider>) {
        let blobs = Arc::new(MemoryStorageProvider::new());
        let cache = ReadThroughCache::with_ttls(
            Arc::new(MemoryCacheProvider::new(&MemoryCacheConfig { max_capacity: 100 })),
            Duration::from_secs(60),
            Duration::from_secs(3600),
        );
        let svc = DocumentService::new(
            Arc::new(MemoryDocumentStore::new()),
            blobs.clone(),
            cache,
            StorageConfig::default(),
        );
        (svc, blobs)
    }

    fn text(name: &str) -> UploadDocument {
        UploadDocument {
            filename: name.to_string(),
            content_type: "text/plain; charset=utf-8".to_string(),
            data: Bytes::from_static(b"Revenue rose 12% year over year."),
        }
    }

    #[tokio::test]
    async fn test_upload_then_list_and_get() {
        let (svc, blobs) = service();
        let ctx = RequestContext::new(UserId::new(), "analyst");

        let doc = svc.upload(&ctx, text("q3.txt")).await.unwrap();
        assert_eq!(blobs.len(), 1);

        let page = svc.list(&ctx, PageRequest::default()).await.unwrap();
        assert_eq!(page.items, vec![doc.clone()]);
        assert_eq!(svc.get(&ctx, doc.id).await.unwrap(), doc);

        // A second upload shows up despite the cached first listing.
        svc.upload(&ctx, text("q4.txt")).await.unwrap();
        let page = svc.list(&ctx, PageRequest::default()).await.unwrap();
        assert_eq!(page.total_items, 2);
    }

    #[tokio::test]
    async fn test_deleted_document_leaves_every_cached_view() {
        let (svc, blobs) = service();
        let ctx = RequestContext::new(UserId::new(), "analyst");
        let doc = svc.upload(&ctx, text("q3.txt")).await.unwrap();

        // Populate caches.
        svc.list(&ctx, PageRequest::default()).await.unwrap();
        svc.get(&ctx, doc.id).await.unwrap();

        svc.delete(&ctx, doc.id).await.unwrap();
        assert!(blobs.is_empty());
        assert!(svc.list(&ctx, PageRequest::default()).await.unwrap().items.is_empty());
        assert_eq!(
            svc.get(&ctx, doc.id).await.unwrap_err().kind,
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn test_other_users_cannot_see_or_delete() {
        let (svc, _) = service();
        let owner = RequestContext::new(UserId::new(), "owner");
        let other = RequestContext::new(UserId::new(), "other");
        let doc = svc.upload(&owner, text("q3.txt")).await.unwrap();

        assert_eq!(svc.get(&other, doc.id).await.unwrap_err().kind, ErrorKind::NotFound);
        assert_eq!(svc.delete(&other, doc.id).await.unwrap_err().kind, ErrorKind::NotFound);
        assert!(svc.list(&other, PageRequest::default()).await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_bad_uploads() {
        let (svc, blobs) = service();
        let ctx = RequestContext::new(UserId::new(), "analyst");

        let mut upload = text("x.exe");
        upload.content_type = "application/x-msdownload".to_string();
        assert_eq!(
            svc.upload(&ctx, upload).await.unwrap_err().kind,
            ErrorKind::UnsupportedMediaType
        );

        let mut upload = text("empty.txt");
        upload.data = Bytes::new();
        assert_eq!(svc.upload(&ctx, upload).await.unwrap_err().kind, ErrorKind::Validation);
        assert!(blobs.is_empty());
    }

    fn pdf_upload(data: Vec<u8>) -> UploadDocument {
        UploadDocument {
            filename: "q3.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            data: Bytes::from(data),
        }
    }

    #[tokio::test]
    async fn test_pdf_uploads_are_preflighted() {
        let (svc, blobs) = service();
        let ctx = RequestContext::new(UserId::new(), "analyst");

        let renamed_text = pdf_upload(b"Revenue rose 12% year over year.".to_vec());
        assert_eq!(
            svc.upload(&ctx, renamed_text).await.unwrap_err().kind,
            ErrorKind::UnsupportedMediaType
        );

        let corrupt = pdf_upload(b"%PDF-1.7\n\x00\x13garbage".to_vec());
        assert_eq!(
            svc.upload(&ctx, corrupt).await.unwrap_err().kind,
            ErrorKind::UnprocessableDocument
        );

        let scanned = pdf_upload(pdf::render_text_pdf(&[]));
        let err = svc.upload(&ctx, scanned).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnprocessableDocument);
        assert!(err.message.contains("OCR"));
        assert!(blobs.is_empty());

        let report = pdf_upload(pdf::render_text_pdf(&["Total revenue was 500 million dollars."]));
        let doc = svc.upload(&ctx, report).await.unwrap();
        assert_eq!(doc.content_type, "application/pdf");
        assert_eq!(blobs.len(), 1);
    }
}
