//! Text extraction from the raw blob.

use async_trait::async_trait;

use analyzer_storage::pdf::{self, PDF_CONTENT_TYPE};

use crate::pipeline::{AnalysisStep, EXTRACT_STEP, StepError, StepInput};

/// Turns the blob into plain text.
///
/// Text-like content types are decoded as UTF-8 with invalid sequences
/// replaced. PDFs go through the PDF text extractor on the blocking pool.
/// Blank lines are collapsed in both cases; any other content type fails
/// the job.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractStep;

#[async_trait]
impl AnalysisStep for ExtractStep {
    fn name(&self) -> &str {
        EXTRACT_STEP
    }

    async fn run(&self, input: &StepInput<'_>) -> Result<String, StepError> {
        let filename = &input.document.filename;
        let essence = media_essence(&input.document.content_type);

        let raw = if is_text_like(&essence) {
            String::from_utf8_lossy(input.content).into_owned()
        } else if essence == PDF_CONTENT_TYPE {
            let content = input.content.clone();
            tokio::task::spawn_blocking(move || pdf::extract_text(&content))
                .await
                .map_err(|e| StepError::Transient(format!("PDF extraction aborted: {e}")))?
                .map_err(|e| StepError::Permanent(format!("Cannot read '{filename}': {e}")))?
        } else {
            return Err(StepError::Permanent(format!(
                "Unsupported content type '{}' for '{filename}'",
                input.document.content_type
            )));
        };

        let text = collapse_blank_lines(&raw);
        if text.is_empty() {
            return Err(StepError::Permanent(format!(
                "No extractable text in '{filename}'"
            )));
        }
        Ok(text)
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

fn is_text_like(essence: &str) -> bool {
    essence.starts_with("text/")
        || matches!(
            essence,
            "application/json" | "application/xml" | "application/csv"
        )
}

fn collapse_blank_lines(raw: &str) -> String {
    raw.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use chrono::Utc;

    use analyzer_core::types::{DocumentId, UserId};
    use analyzer_entity::document::Document;

    use super::*;

    fn document(content_type: &str) -> Document {
        Document {
            id: DocumentId::new(),
            owner_id: UserId::new(),
            filename: "q3.txt".to_string(),
            content_type: content_type.to_string(),
            size_bytes: 0,
            storage_path: "documents/x".to_string(),
            created_at: Utc::now(),
        }
    }

    async fn extract(content_type: &str, content: &'static [u8]) -> Result<String, StepError> {
        let document = document(content_type);
        let content = Bytes::from_static(content);
        ExtractStep
            .run(&StepInput {
                document: &document,
                content: &content,
                query: "q",
                previous: &[],
            })
            .await
    }

    #[tokio::test]
    async fn test_plain_text_collapses_blank_lines() {
        let text = extract("text/plain", b"Revenue: $1.2B\n\n\n  \nNet income: $200M\n")
            .await
            .unwrap();
        assert_eq!(text, "Revenue: $1.2B\nNet income: $200M");
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced_not_rejected() {
        let text = extract("text/plain", b"Revenue \xff grew").await.unwrap();
        assert!(text.starts_with("Revenue"));
        assert!(text.ends_with("grew"));
    }

    #[tokio::test]
    async fn test_pdf_text_layer_is_extracted() {
        let document = document("application/pdf");
        let content = Bytes::from(pdf::render_text_pdf(&[
            "Quarterly Report",
            "Total revenue was 500 million dollars.",
            "Net income was 80 million dollars.",
            "Net income was 80 million dollars.",
            "Net income was 80 million dollars.",
        ]));
        assert!(content.windows(11).any(|w| w == b"FlateDecode"));

        let text = ExtractStep
            .run(&StepInput {
                document: &document,
                content: &content,
                query: "q",
                previous: &[],
            })
            .await
            .unwrap();
        let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
        assert!(flat.contains("Total revenue was 500 million dollars"), "{flat}");
        assert!(!flat.contains("FlateDecode"));
        assert!(!flat.contains("obj"));
    }

    #[tokio::test]
    async fn test_unparseable_pdf_is_permanent_failure() {
        let err = extract("application/pdf", b"%PDF-1.4\n\x00\x01Total revenue 500\x02")
            .await
            .unwrap_err();
        assert!(!err.is_transient(), "{err}");

        let err = extract("application/pdf", b"Total revenue 500")
            .await
            .unwrap_err();
        assert!(!err.is_transient(), "{err}");
    }

    #[tokio::test]
    async fn test_unsupported_type_is_permanent_failure() {
        let err = extract("image/png", b"\x89PNG\r\n").await.unwrap_err();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("image/png"));
    }

    #[tokio::test]
    async fn test_blank_document_is_permanent_failure() {
        let err = extract("text/plain", b"  \n\n \t\n").await.unwrap_err();
        assert!(!err.is_transient());
    }
}
