//! End-to-end pipeline tests with in-memory collaborators.

use async_trait::async_trait;
use planscope_core::{AppError, AppResult};
use planscope_ingest::embeddings::providers::mock::MockProvider;
use planscope_ingest::{
    BatchItem, BatchSummary, ChunkOptions, DocumentExtractor, DocumentMeta, EmbeddingProvider,
    ExtractedDocument, IngestConfig, IngestOptions, IngestPipeline, IngestStage, MemoryStore,
    PacingPolicy, SourceLocator, SplitOn, Tokenizer, VectorRecord, VectorStore,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

static TOKENIZER: LazyLock<Arc<Tokenizer>> =
    LazyLock::new(|| Arc::new(Tokenizer::cl100k().unwrap()));

const PLAN_TEXT: &str = "-- 1 of 2 --\n\
Plan de Gobierno 2026-2030\n\n\
La educaciÃ³n pública es la base del desarrollo nacional. Proponemos ampliar \
la inversión en infraestructura escolar y fortalecer la formación docente.  #ff0000\n\
,,,\n\n\
El Ministerio de Salud y la CCSS coordinarán acciones en Guanacaste y Limón.\n\
-- 2 of 2 --\n\
La seguridad ciudadana requiere una reforma integral del sistema de justicia. \
La transparencia y la lucha contra la corrupción guiarán la gestión pública.";

#[derive(Debug)]
struct FakeExtractor {
    text: String,
    delay: Option<Duration>,
}

impl FakeExtractor {
    fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            delay: None,
        }
    }
}

#[async_trait]
impl DocumentExtractor for FakeExtractor {
    fn name(&self) -> &str {
        "fake"
    }

    async fn extract(&self, _path: &Path) -> AppResult<ExtractedDocument> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(ExtractedDocument {
            text: self.text.clone(),
            page_count: 2,
            metadata: Default::default(),
        })
    }

    async fn validate(&self, _path: &Path) -> bool {
        true
    }
}

#[derive(Debug)]
struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn provider_name(&self) -> &str {
        "failing"
    }

    fn model_name(&self) -> &str {
        "none"
    }

    fn dimensions(&self) -> usize {
        8
    }

    fn max_input_tokens(&self) -> usize {
        8191
    }

    async fn embed_batch(&self, _texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Err(AppError::DownstreamUnavailable("provider offline".to_string()))
    }
}

struct FailingStore;

#[async_trait]
impl VectorStore for FailingStore {
    fn name(&self) -> &str {
        "failing"
    }

    async fn upsert_document(&self, _meta: &DocumentMeta) -> AppResult<Uuid> {
        Err(AppError::DownstreamUnavailable("store offline".to_string()))
    }

    async fn upsert(&self, _records: &[VectorRecord]) -> AppResult<()> {
        Err(AppError::DownstreamUnavailable("store offline".to_string()))
    }
}

fn source_file(dir: &TempDir, name: &str) -> SourceLocator {
    let path = dir.path().join(name);
    std::fs::write(&path, "placeholder").unwrap();
    SourceLocator::Path(path)
}

fn small_chunks() -> ChunkOptions {
    ChunkOptions {
        chunk_size: 40,
        max_chunk_size: 80,
        overlap_size: 5,
        split_on: SplitOn::Paragraph,
        embedding_max_tokens: 8191,
    }
}

fn pipeline(config: &IngestConfig) -> IngestPipeline {
    IngestPipeline::new(TOKENIZER.clone(), config)
        .with_extractor(Arc::new(FakeExtractor::new(PLAN_TEXT)))
}

fn full_options() -> IngestOptions {
    IngestOptions {
        embed: true,
        store: true,
        chunking: Some(small_chunks()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_ingest_embeds_and_stores() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let pipeline = pipeline(&IngestConfig::default())
        .with_embedder(Arc::new(MockProvider::new(64)))
        .with_store(store.clone());

    let result = pipeline
        .ingest(&source_file(&dir, "plan.pdf"), "plan-2026", &full_options())
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.stage, IngestStage::Done);
    assert!(result.downstream_error.is_none());

    let chunks = result.chunks.unwrap();
    assert!(chunks.len() >= 2);
    assert_eq!(result.stats.chunk_count, chunks.len());
    assert_eq!(result.stats.embedded_count, chunks.len());
    assert_eq!(result.stats.stored_count, chunks.len());
    assert_eq!(result.stats.page_count, 2);

    for (i, annotated) in chunks.iter().enumerate() {
        assert_eq!(annotated.chunk.chunk_index, i);
        assert_eq!(annotated.chunk.document_id, "plan-2026");
        assert!(annotated.chunk.tokens <= 80);
        assert!((0.0..=1.0).contains(&annotated.quality.quality_score));
        assert!(!annotated.chunk.content.contains("-- 2 of 2 --"));
        assert!(!annotated.chunk.content.contains("#ff0000"));
    }
    assert_eq!(chunks[0].chunk.page_number, Some(1));
    let last = chunks.last().unwrap();
    assert!(last.chunk.page_number == Some(2) || last.chunk.page_range.is_some());

    let uuid = result.document_uuid.unwrap();
    let records = store.records_for("plan-2026").await;
    assert_eq!(records.len(), chunks.len());
    assert!(records.iter().all(|r| r.document_uuid == uuid));
    assert!(records
        .iter()
        .all(|r| r.embedding.as_ref().map(Vec::len) == Some(64)));

    let entities: Vec<&String> = chunks
        .iter()
        .flat_map(|c| c.keywords.entities.iter())
        .collect();
    assert!(entities.iter().any(|e| e.as_str() == "CCSS"));
}

#[tokio::test]
async fn test_missing_source_fails_at_obtaining() {
    let pipeline = pipeline(&IngestConfig::default());
    let source = SourceLocator::Path(PathBuf::from("/nonexistent/plan.pdf"));

    let result = pipeline.ingest(&source, "missing", &IngestOptions::default()).await;

    assert!(!result.success);
    assert_eq!(result.stage, IngestStage::Obtaining);
    assert!(result.chunks.is_none());
    assert!(result.error.unwrap().contains("Source unavailable"));
}

#[tokio::test]
async fn test_embedding_failure_keeps_chunks() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let pipeline = pipeline(&IngestConfig::default())
        .with_embedder(Arc::new(FailingEmbedder))
        .with_store(store.clone());

    let result = pipeline
        .ingest(&source_file(&dir, "plan.pdf"), "plan", &full_options())
        .await;

    assert!(result.success);
    assert_eq!(result.stage, IngestStage::Done);
    assert!(result.downstream_error.unwrap().contains("provider offline"));
    assert!(!result.chunks.unwrap().is_empty());
    assert_eq!(result.stats.stored_count, 0);
    assert_eq!(store.record_count().await, 0);
}

#[tokio::test]
async fn test_storage_failure_keeps_chunks() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(&IngestConfig::default())
        .with_embedder(Arc::new(MockProvider::new(16)))
        .with_store(Arc::new(FailingStore));

    let result = pipeline
        .ingest(&source_file(&dir, "plan.pdf"), "plan", &full_options())
        .await;

    assert!(result.success);
    assert!(result.downstream_error.unwrap().contains("store offline"));
    assert!(result.document_uuid.is_none());
    assert!(result.stats.embedded_count > 0);
}

#[tokio::test]
async fn test_missing_embedder_is_downstream_error() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(&IngestConfig::default());
    let options = IngestOptions {
        embed: true,
        ..Default::default()
    };

    let result = pipeline.ingest(&source_file(&dir, "plan.pdf"), "plan", &options).await;
    assert!(result.success);
    assert!(result.downstream_error.is_some());
}

#[tokio::test]
async fn test_drop_low_quality_only_filters_storage() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let pipeline = pipeline(&IngestConfig::default()).with_store(store.clone());
    let options = IngestOptions {
        store: true,
        drop_low_quality: true,
        quality_threshold: 0.999,
        chunking: Some(small_chunks()),
        ..Default::default()
    };

    let result = pipeline.ingest(&source_file(&dir, "plan.pdf"), "plan", &options).await;

    assert!(result.success);
    let chunks = result.chunks.unwrap();
    assert_eq!(chunks.len(), result.stats.chunk_count);
    assert_eq!(
        result.stats.stored_count + result.stats.dropped_low_quality,
        chunks.len()
    );
    assert_eq!(store.record_count().await, result.stats.stored_count);
}

#[tokio::test]
async fn test_extraction_timeout() {
    let dir = TempDir::new().unwrap();
    let mut config = IngestConfig::default();
    config.timeouts.extract_secs = 0;
    let slow = FakeExtractor {
        text: PLAN_TEXT.to_string(),
        delay: Some(Duration::from_millis(200)),
    };
    let pipeline = IngestPipeline::new(TOKENIZER.clone(), &config).with_extractor(Arc::new(slow));

    let result = pipeline
        .ingest(&source_file(&dir, "plan.pdf"), "slow", &IngestOptions::default())
        .await;

    assert!(!result.success);
    assert_eq!(result.stage, IngestStage::Extracting);
    assert!(result.error.unwrap().contains("extract"));
}

#[tokio::test]
async fn test_empty_document_yields_no_chunks() {
    let dir = TempDir::new().unwrap();
    let pipeline = IngestPipeline::new(TOKENIZER.clone(), &IngestConfig::default())
        .with_extractor(Arc::new(FakeExtractor::new("#ffffff\n,,,\n")));

    let result = pipeline
        .ingest(&source_file(&dir, "empty.pdf"), "empty", &IngestOptions::default())
        .await;

    assert!(result.success);
    assert!(result.chunks.unwrap().is_empty());
    assert_eq!(result.stats.cleaned_chars, 0);
}

#[tokio::test]
async fn test_batch_continues_after_failure() {
    let dir = TempDir::new().unwrap();
    let mut config = IngestConfig::default();
    config.pacing = PacingPolicy::FixedDelay { delay_ms: 10 };
    let pipeline = pipeline(&config);

    let items = vec![
        BatchItem {
            source: source_file(&dir, "a.pdf"),
            document_id: "a".to_string(),
        },
        BatchItem {
            source: SourceLocator::Path(dir.path().join("missing.pdf")),
            document_id: "b".to_string(),
        },
        BatchItem {
            source: source_file(&dir, "c.pdf"),
            document_id: "c".to_string(),
        },
    ];

    let results = pipeline.ingest_batch(&items, &IngestOptions::default()).await;

    assert_eq!(results.len(), 3);
    let outcomes: Vec<(&str, bool)> = results
        .iter()
        .map(|r| (r.document_id.as_str(), r.success))
        .collect();
    assert_eq!(outcomes, vec![("a", true), ("b", false), ("c", true)]);

    let summary = BatchSummary::from_results(&results);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn test_result_serializes_camel_case() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(&IngestConfig::default());

    let result = pipeline
        .ingest(&source_file(&dir, "plan.pdf"), "plan", &IngestOptions::default())
        .await;
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["documentId"], "plan");
    assert_eq!(json["stage"], "done");
    assert!(json["stats"]["chunkMs"].is_u64());
    assert!(json["chunks"][0]["chunkId"].is_string());
    assert!(json["chunks"][0]["quality"]["qualityScore"].is_number());
    assert!(json["chunks"][0]["keywords"].is_array());
}

#[test]
fn test_shutdown_releases_tokenizer() {
    let tokenizer = Arc::new(Tokenizer::cl100k().unwrap());
    let pipeline = IngestPipeline::new(tokenizer.clone(), &IngestConfig::default());
    assert_eq!(Arc::strong_count(&tokenizer), 2);

    pipeline.shutdown();
    assert_eq!(Arc::strong_count(&tokenizer), 1);
}
