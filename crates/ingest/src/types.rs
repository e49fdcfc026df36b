//! Ingestion data model.
//!
//! Offsets (`PageMarker::position`, `TextChunk::start_char`/`end_char`) are UTF-8
//! byte offsets into the cleaned text and always fall on a char boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Text produced by the extraction collaborator. Immutable input to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDocument {
    pub document_id: String,
    pub text: String,
    pub page_count: u32,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// An in-text page marker such as `-- 3 of 12 --`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMarker {
    pub page_number: u32,
    pub total_pages: u32,
    /// Byte offset into the text the marker was stripped from.
    pub position: usize,
}

/// Output of the normalizer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleaningResult {
    pub cleaned_text: String,
    /// Ordered by `position`, re-based onto `cleaned_text`.
    pub page_markers: Vec<PageMarker>,
}

/// Inclusive page span for a chunk that crosses a page boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

/// A retrieval-sized passage of cleaned text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextChunk {
    pub chunk_id: String,
    pub document_id: String,
    pub content: String,
    pub tokens: usize,
    pub chunk_index: usize,
    pub start_char: usize,
    pub end_char: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_range: Option<PageRange>,
}

impl TextChunk {
    /// Deterministic id so re-ingesting a document upserts the same records.
    pub fn make_id(document_id: &str, chunk_index: usize) -> String {
        format!("{}_chunk_{}", document_id, chunk_index)
    }
}

/// Composite quality assessment of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetrics {
    pub quality_score: f64,
    pub length_score: f64,
    pub special_char_ratio: f64,
    pub has_keywords: bool,
    pub readability: f64,
}

/// Ranked keywords and deduplicated entities for a chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordExtractionResult {
    /// Relevance-descending.
    pub keywords: Vec<String>,
    pub entities: BTreeSet<String>,
}

/// A chunk together with its derived metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedChunk {
    #[serde(flatten)]
    pub chunk: TextChunk,
    pub quality: QualityMetrics,
    #[serde(flatten)]
    pub keywords: KeywordExtractionResult,
}

/// Pipeline state machine. On failure, the stage that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStage {
    Obtaining,
    Extracting,
    Cleaning,
    Chunking,
    Annotating,
    Embedding,
    Storing,
    Done,
}

impl std::fmt::Display for IngestStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IngestStage::Obtaining => "obtaining",
            IngestStage::Extracting => "extracting",
            IngestStage::Cleaning => "cleaning",
            IngestStage::Chunking => "chunking",
            IngestStage::Annotating => "annotating",
            IngestStage::Embedding => "embedding",
            IngestStage::Storing => "storing",
            IngestStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Per-stage wall-clock durations (milliseconds) and counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestStats {
    pub obtain_ms: u64,
    pub extract_ms: u64,
    pub clean_ms: u64,
    pub chunk_ms: u64,
    pub annotate_ms: u64,
    pub embed_ms: u64,
    pub store_ms: u64,
    pub total_ms: u64,
    pub page_count: u32,
    pub raw_chars: usize,
    pub cleaned_chars: usize,
    pub chunk_count: usize,
    pub dropped_low_quality: usize,
    pub embedded_count: usize,
    pub stored_count: usize,
}

/// Outcome of ingesting one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResult {
    pub document_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks: Option<Vec<AnnotatedChunk>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Embedding or storage failure; chunks are still returned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downstream_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_uuid: Option<Uuid>,
    pub stage: IngestStage,
    pub stats: IngestStats,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_format() {
        assert_eq!(TextChunk::make_id("plan-2026", 3), "plan-2026_chunk_3");
    }

    #[test]
    fn test_chunk_serializes_camel_case() {
        let chunk = TextChunk {
            chunk_id: TextChunk::make_id("doc", 0),
            document_id: "doc".to_string(),
            content: "Hola".to_string(),
            tokens: 1,
            chunk_index: 0,
            start_char: 0,
            end_char: 4,
            page_number: Some(1),
            page_range: None,
        };

        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(json["chunkId"], "doc_chunk_0");
        assert_eq!(json["startChar"], 0);
        assert_eq!(json["pageNumber"], 1);
        assert!(json.get("pageRange").is_none());
    }

    #[test]
    fn test_entities_serialize_sorted() {
        let mut result = KeywordExtractionResult::default();
        result.entities.insert("PUSC".to_string());
        result.entities.insert("CCSS".to_string());

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains(r#"["CCSS","PUSC"]"#));
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(IngestStage::Annotating.to_string(), "annotating");
        let json = serde_json::to_string(&IngestStage::Done).unwrap();
        assert_eq!(json, "\"done\"");
    }
}
