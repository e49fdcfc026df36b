//! Vector/document store collaborators.
//!
//! The pipeline registers each document once and then upserts one record per
//! chunk, bundling content, embedding and derived metadata.

mod jsonl;
mod memory;

pub use jsonl::JsonlStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use planscope_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::types::{AnnotatedChunk, PageRange, QualityMetrics};

/// Document-level row written before its chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMeta {
    pub document_id: String,
    pub source: String,
    pub page_count: u32,
    pub chunk_count: usize,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub ingested_at: DateTime<Utc>,
}

/// Per-chunk metadata stored next to the vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    pub chunk_index: usize,
    pub tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_range: Option<PageRange>,
    pub quality: QualityMetrics,
    pub keywords: Vec<String>,
    pub entities: BTreeSet<String>,
    /// SHA-256 of the chunk content, hex
    pub content_hash: String,
}

/// One stored chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorRecord {
    /// Chunk id, stable across re-ingestion
    pub id: String,
    pub document_uuid: Uuid,
    pub document_id: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub metadata: RecordMetadata,
}

impl VectorRecord {
    pub fn from_chunk(
        annotated: &AnnotatedChunk,
        document_uuid: Uuid,
        embedding: Option<Vec<f32>>,
    ) -> Self {
        let chunk = &annotated.chunk;
        Self {
            id: chunk.chunk_id.clone(),
            document_uuid,
            document_id: chunk.document_id.clone(),
            content: chunk.content.clone(),
            embedding,
            metadata: RecordMetadata {
                chunk_index: chunk.chunk_index,
                tokens: chunk.tokens,
                page_number: chunk.page_number,
                page_range: chunk.page_range,
                quality: annotated.quality,
                keywords: annotated.keywords.keywords.clone(),
                entities: annotated.keywords.entities.clone(),
                content_hash: content_hash(&chunk.content),
            },
        }
    }
}

/// SHA-256 of `text` as lowercase hex.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Destination for documents and chunk records.
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn name(&self) -> &str;

    /// Register a document, returning its UUID. Re-registering the same
    /// `document_id` returns the same UUID.
    async fn upsert_document(&self, meta: &DocumentMeta) -> AppResult<Uuid>;

    /// Insert or replace records by id.
    async fn upsert(&self, records: &[VectorRecord]) -> AppResult<()>;
}

/// Store selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// "none", "memory" or "jsonl"
    pub kind: String,

    /// Directory for the jsonl store, relative to the workspace
    pub path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: "none".to_string(),
            path: None,
        }
    }
}

impl StoreConfig {
    pub fn is_enabled(&self) -> bool {
        !self.kind.is_empty() && self.kind != "none"
    }
}

/// Create a store from configuration.
pub fn create_store(config: &StoreConfig, workspace: &Path) -> AppResult<Arc<dyn VectorStore>> {
    match config.kind.as_str() {
        "memory" => Ok(Arc::new(MemoryStore::new())),
        "jsonl" => {
            let dir = config
                .path
                .as_ref()
                .map(|p| workspace.join(p))
                .unwrap_or_else(|| workspace.join(planscope_core::config::STATE_DIR).join("store"));
            Ok(Arc::new(JsonlStore::open(dir)?))
        }
        "none" | "" => Err(AppError::Config(
            "Storage is disabled. Set store.kind to 'memory' or 'jsonl'".to_string(),
        )),
        other => Err(AppError::Config(format!(
            "Unknown store kind: '{}'. Supported kinds: memory, jsonl",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{KeywordExtractionResult, TextChunk};

    pub(crate) fn sample_chunk(index: usize, content: &str) -> AnnotatedChunk {
        AnnotatedChunk {
            chunk: TextChunk {
                chunk_id: TextChunk::make_id("plan", index),
                document_id: "plan".to_string(),
                content: content.to_string(),
                tokens: 3,
                chunk_index: index,
                start_char: 0,
                end_char: content.len(),
                page_number: Some(1),
                page_range: None,
            },
            quality: crate::quality::score(content),
            keywords: KeywordExtractionResult::default(),
        }
    }

    #[test]
    fn test_content_hash() {
        let hash = content_hash("Hola mundo");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, content_hash("Hola mundo"));
        assert_ne!(hash, content_hash("Adiós mundo"));
    }

    #[test]
    fn test_record_from_chunk() {
        let chunk = sample_chunk(2, "Salud pública para todos");
        let uuid = Uuid::new_v4();
        let record = VectorRecord::from_chunk(&chunk, uuid, Some(vec![0.5, 0.5]));

        assert_eq!(record.id, "plan_chunk_2");
        assert_eq!(record.document_uuid, uuid);
        assert_eq!(record.metadata.chunk_index, 2);
        assert_eq!(record.metadata.page_number, Some(1));
        assert_eq!(record.metadata.content_hash, content_hash("Salud pública para todos"));

        let json = serde_json::to_value(&record).unwrap();
        assert!(json["metadata"]["contentHash"].is_string());
        assert!(json["metadata"].get("pageRange").is_none());
    }

    #[test]
    fn test_create_store_kinds() {
        let dir = tempfile::TempDir::new().unwrap();
        let memory = StoreConfig {
            kind: "memory".to_string(),
            path: None,
        };
        assert_eq!(create_store(&memory, dir.path()).unwrap().name(), "memory");

        let jsonl = StoreConfig {
            kind: "jsonl".to_string(),
            path: Some(PathBuf::from("out")),
        };
        assert_eq!(create_store(&jsonl, dir.path()).unwrap().name(), "jsonl");
        assert!(dir.path().join("out").is_dir());

        assert!(create_store(&StoreConfig::default(), dir.path()).is_err());
    }
}
