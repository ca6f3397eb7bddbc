//! PDF inspection and text extraction.
//!
//! `pdf-extract` handles most documents; when it fails or yields nothing,
//! the document is reloaded with `lopdf` and its page text is pulled from
//! the content streams directly. Both paths are synchronous and CPU bound,
//! so async callers run them on the blocking pool.

use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, warn};

/// MIME type of PDF uploads.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Every PDF file starts with this marker.
pub const PDF_MAGIC: &[u8] = b"%PDF-";

/// Why no text could be recovered from a PDF.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PdfError {
    #[error("missing %PDF- header")]
    NotPdf,
    #[error("PDF could not be parsed: {0}")]
    Unreadable(String),
    #[error("PDF is password-protected")]
    Encrypted,
    #[error("PDF contains no extractable text")]
    NoText,
}

/// Whether `data` starts with the PDF magic header.
pub fn has_pdf_header(data: &[u8]) -> bool {
    data.starts_with(PDF_MAGIC)
}

/// Extract the readable text of a PDF.
///
/// NUL characters and blank lines are removed from the result. A document
/// whose text has no alphanumeric character at all (typically a scan)
/// yields [`PdfError::NoText`].
pub fn extract_text(data: &[u8]) -> Result<String, PdfError> {
    if !has_pdf_header(data) {
        return Err(PdfError::NotPdf);
    }

    let primary = match panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem(data)
    })) {
        Ok(Ok(text)) => Some(text),
        Ok(Err(e)) => {
            warn!(error = %e, "pdf-extract failed, trying lopdf");
            None
        }
        Err(_) => {
            warn!("pdf-extract panicked, trying lopdf");
            None
        }
    };

    if let Some(text) = primary.map(|t| clean(&t)).filter(|t| has_words(t)) {
        return Ok(text);
    }

    let text = clean(&extract_with_lopdf(data)?);
    if has_words(&text) {
        Ok(text)
    } else {
        Err(PdfError::NoText)
    }
}

fn extract_with_lopdf(data: &[u8]) -> Result<String, PdfError> {
    let doc = panic::catch_unwind(AssertUnwindSafe(|| lopdf::Document::load_mem(data)))
        .map_err(|_| PdfError::Unreadable("parser panicked".to_string()))?
        .map_err(|e| PdfError::Unreadable(e.to_string()))?;

    let encrypted = doc.trailer.get(b"Encrypt").is_ok();
    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    if pages.is_empty() {
        return Err(if encrypted {
            PdfError::Encrypted
        } else {
            PdfError::Unreadable("document has no pages".to_string())
        });
    }

    match doc.extract_text(&pages) {
        Ok(text) => Ok(text),
        Err(_) if encrypted => Err(PdfError::Encrypted),
        Err(e) => {
            debug!(error = %e, pages = pages.len(), "lopdf found no page text");
            Err(PdfError::NoText)
        }
    }
}

fn clean(raw: &str) -> String {
    raw.replace('\0', "")
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn has_words(text: &str) -> bool {
    text.chars().any(char::is_alphanumeric)
}

/// Render a single-page PDF whose page shows `lines` in Helvetica.
///
/// Streams are Flate-compressed, as in PDFs produced by real tools. An
/// empty `lines` slice gives a page with no text, like a scan.
#[cfg(any(test, feature = "test-util"))]
pub fn render_text_pdf(lines: &[&str]) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{Document, Object, Stream, dictionary};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut operations = Vec::new();
    if !lines.is_empty() {
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Tf", vec!["F1".into(), 11.into()]));
        operations.push(Operation::new("TL", vec![14.into()]));
        operations.push(Operation::new("Td", vec![50.into(), 780.into()]));
        for line in lines {
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            operations.push(Operation::new("T*", vec![]));
        }
        operations.push(Operation::new("ET", vec![]));
    }
    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().unwrap_or_default(),
    ));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap_or_default();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &[&str] = &[
        "Quarterly Report",
        "Total revenue was 500 million dollars.",
        "Operating costs fell by 12 percent.",
        "Operating costs fell by 12 percent.",
        "Operating costs fell by 12 percent.",
        "Operating costs fell by 12 percent.",
    ];

    fn words(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_flate_compressed_pdf_yields_its_text() {
        let pdf = render_text_pdf(REPORT);
        assert!(has_pdf_header(&pdf));
        assert!(
            pdf.windows(b"FlateDecode".len()).any(|w| w == b"FlateDecode"),
            "content stream should be compressed"
        );

        let text = extract_text(&pdf).unwrap();
        let flat = words(&text);
        assert!(flat.contains("Total revenue was 500 million dollars"), "{flat}");
        assert!(!flat.contains("FlateDecode"));
        assert!(!flat.contains("endobj"));
    }

    #[test]
    fn test_page_without_text_is_no_text() {
        let pdf = render_text_pdf(&[]);
        assert_eq!(extract_text(&pdf), Err(PdfError::NoText));
    }

    #[test]
    fn test_missing_header_is_not_pdf() {
        assert_eq!(extract_text(b"hello world"), Err(PdfError::NotPdf));
    }

    #[test]
    fn test_truncated_body_is_unreadable() {
        let err = extract_text(b"%PDF-1.4\n1 0 obj << /Type /Cat").unwrap_err();
        assert!(matches!(err, PdfError::Unreadable(_)), "{err:?}");
    }

    #[test]
    fn test_clean_drops_nul_and_blank_lines() {
        assert_eq!(clean("  a\0b  \n\n   \n c "), "ab\nc");
    }
}
