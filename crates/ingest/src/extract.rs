//! Text extraction from source documents.
//!
//! PDF text comes from `pdf-extract`, which separates pages with form feeds;
//! the page count comes from `lopdf`. Extracted pages are rejoined with
//! `-- N of M --` separators in front of each page so downstream cleaning can
//! recover page boundaries.

use async_trait::async_trait;
use lopdf::Document;
use planscope_core::{AppError, AppResult};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument, warn};

const PAGE_BREAK: char = '\x0C';
const PDF_MAGIC: &[u8; 5] = b"%PDF-";

/// Text and page information pulled out of a source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedDocument {
    pub text: String,
    pub page_count: u32,
    pub metadata: BTreeMap<String, String>,
}

/// Turns a local file into text.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// Extractor name for logs.
    fn name(&self) -> &str;

    /// Extract text, page count and metadata.
    async fn extract(&self, path: &Path) -> AppResult<ExtractedDocument>;

    /// Whether `path` looks like something this extractor can read.
    async fn validate(&self, path: &Path) -> bool;
}

/// Extractor for PDF files.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentExtractor for PdfExtractor {
    fn name(&self) -> &str {
        "pdf"
    }

    #[instrument(skip(self), fields(extractor = "pdf"))]
    async fn extract(&self, path: &Path) -> AppResult<ExtractedDocument> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            AppError::SourceUnavailable(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let size = bytes.len();

        let (text, page_count) = tokio::task::spawn_blocking(move || extract_pdf(&bytes))
            .await
            .map_err(|e| AppError::Extraction(format!("Task join error: {}", e)))??;

        debug!(bytes = size, pages = page_count, chars = text.len(), "Extracted PDF text");

        let mut metadata = BTreeMap::new();
        metadata.insert("format".to_string(), "pdf".to_string());
        metadata.insert("bytes".to_string(), size.to_string());
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            metadata.insert("file_name".to_string(), name.to_string());
        }

        Ok(ExtractedDocument {
            text,
            page_count,
            metadata,
        })
    }

    async fn validate(&self, path: &Path) -> bool {
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if !is_pdf {
            return false;
        }
        let Ok(mut file) = tokio::fs::File::open(path).await else {
            return false;
        };
        let mut header = [0u8; 5];
        match file.read_exact(&mut header).await {
            Ok(_) => &header == PDF_MAGIC,
            Err(_) => false,
        }
    }
}

fn extract_pdf(bytes: &[u8]) -> AppResult<(String, u32)> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| AppError::Extraction(format!("PDF text extraction failed: {}", e)))?;

    let page_count = match Document::load_mem(bytes) {
        Ok(doc) => doc.get_pages().len() as u32,
        Err(e) => {
            warn!("Failed to load PDF for page count: {}", e);
            0
        }
    };

    Ok(join_pages(&text, page_count))
}

/// Rejoin form-feed separated pages with page markers.
///
/// Returns the joined text and the page count. Without page breaks the text
/// is returned unchanged.
pub fn join_pages(text: &str, page_count: u32) -> (String, u32) {
    let mut pages: Vec<&str> = text.split(PAGE_BREAK).collect();
    if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }

    if pages.len() <= 1 {
        return (text.to_string(), page_count.max(1));
    }

    let total = page_count.max(pages.len() as u32);
    let mut out = String::with_capacity(text.len() + pages.len() * 16);
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format!("-- {} of {} --\n", i + 1, total));
        out.push_str(page.trim_end());
    }
    (out, total)
}

/// Extractor for plain-text files. Form feeds are treated as page breaks.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

#[async_trait]
impl DocumentExtractor for PlainTextExtractor {
    fn name(&self) -> &str {
        "text"
    }

    #[instrument(skip(self), fields(extractor = "text"))]
    async fn extract(&self, path: &Path) -> AppResult<ExtractedDocument> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::SourceUnavailable(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let (text, page_count) = join_pages(&raw, 1);

        let mut metadata = BTreeMap::new();
        metadata.insert("format".to_string(), "text".to_string());
        metadata.insert("bytes".to_string(), raw.len().to_string());

        Ok(ExtractedDocument {
            text,
            page_count,
            metadata,
        })
    }

    async fn validate(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }
}

/// Pick an extractor for `path` by extension.
pub fn extractor_for(path: &Path) -> Box<dyn DocumentExtractor> {
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        Box::new(PdfExtractor::new())
    } else {
        Box::new(PlainTextExtractor)
    }
}
