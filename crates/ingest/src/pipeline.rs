//! Pipeline orchestrator.
//!
//! One document moves through `Obtaining → Extracting → Cleaning → Chunking →
//! Annotating → (Embedding) → (Storing) → Done`. A failure in any of the
//! first five stages ends the run with `success = false`. Embedding and
//! storage are optional: their failures are recorded in `downstream_error`
//! and the computed chunks are still returned.

use chrono::{DateTime, Utc};
use planscope_core::{AppError, AppResult};
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::chunk::{ChunkOptions, Chunker};
use crate::config::{IngestConfig, TimeoutConfig};
use crate::embeddings::{create_provider, EmbeddingProvider};
use crate::extract::{extractor_for, DocumentExtractor};
use crate::keywords;
use crate::normalize::Normalizer;
use crate::pacing::{Pacer, PacingPolicy};
use crate::quality::{self, should_keep_chunk};
use crate::store::{create_store, DocumentMeta, VectorRecord, VectorStore};
use crate::tokenizer::Tokenizer;
use crate::types::{AnnotatedChunk, IngestResult, IngestStage, IngestStats, RawDocument, TextChunk};

/// Where a document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocator {
    Path(PathBuf),
    Url(String),
}

impl FromStr for SourceLocator {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AppError::SourceUnavailable("Empty source".to_string()));
        }
        let lower = s.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Ok(SourceLocator::Url(s.to_string()))
        } else {
            Ok(SourceLocator::Path(PathBuf::from(s)))
        }
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocator::Path(path) => write!(f, "{}", path.display()),
            SourceLocator::Url(url) => f.write_str(url),
        }
    }
}

/// One entry of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub source: SourceLocator,
    pub document_id: String,
}

/// Per-call options.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOptions {
    pub embed: bool,
    pub store: bool,
    pub drop_low_quality: bool,
    pub quality_threshold: f64,
    pub max_keywords: usize,
    /// Replaces the pipeline's chunking options for this call
    pub chunking: Option<ChunkOptions>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            embed: false,
            store: false,
            drop_low_quality: false,
            quality_threshold: quality::DEFAULT_THRESHOLD,
            max_keywords: keywords::DEFAULT_MAX_KEYWORDS,
            chunking: None,
        }
    }
}

impl IngestOptions {
    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            embed: config.embedding.is_enabled(),
            store: config.store.is_enabled(),
            drop_low_quality: config.quality.drop_low_quality,
            quality_threshold: config.quality.threshold,
            max_keywords: config.keywords.max_keywords,
            chunking: None,
        }
    }
}

/// Counts over a batch of results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub downstream_failures: usize,
    pub chunks: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[IngestResult]) -> Self {
        results.iter().fold(Self::default(), |mut summary, result| {
            summary.total += 1;
            if result.success {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
            if result.downstream_error.is_some() {
                summary.downstream_failures += 1;
            }
            summary.chunks += result.stats.chunk_count;
            summary
        })
    }
}

/// A source made available on the local filesystem.
struct LocalSource {
    path: PathBuf,
    /// Keeps a downloaded file alive until the run ends
    _download: Option<NamedTempFile>,
}

/// Stage bookkeeping for one run.
struct Tracker {
    document_id: String,
    started_at: DateTime<Utc>,
    clock: Instant,
    stage: IngestStage,
    stage_clock: Instant,
    stats: IngestStats,
}

impl Tracker {
    fn new(document_id: &str) -> Self {
        Self {
            document_id: document_id.to_string(),
            started_at: Utc::now(),
            clock: Instant::now(),
            stage: IngestStage::Obtaining,
            stage_clock: Instant::now(),
            stats: IngestStats::default(),
        }
    }

    fn enter(&mut self, stage: IngestStage) {
        self.stage = stage;
        self.stage_clock = Instant::now();
    }

    /// Record the current stage's duration.
    fn leave(&mut self) {
        let ms = self.stage_clock.elapsed().as_millis() as u64;
        let slot = match self.stage {
            IngestStage::Obtaining => &mut self.stats.obtain_ms,
            IngestStage::Extracting => &mut self.stats.extract_ms,
            IngestStage::Cleaning => &mut self.stats.clean_ms,
            IngestStage::Chunking => &mut self.stats.chunk_ms,
            IngestStage::Annotating => &mut self.stats.annotate_ms,
            IngestStage::Embedding => &mut self.stats.embed_ms,
            IngestStage::Storing => &mut self.stats.store_ms,
            IngestStage::Done => return,
        };
        *slot = ms;
        info!(document_id = %self.document_id, stage = %self.stage, duration_ms = ms, "Stage finished");
    }

    fn fail(mut self, err: AppError) -> IngestResult {
        self.leave();
        self.stats.total_ms = self.clock.elapsed().as_millis() as u64;
        error!(
            document_id = %self.document_id,
            stage = %self.stage,
            total_ms = self.stats.total_ms,
            "Ingestion failed: {}",
            err
        );
        IngestResult {
            document_id: self.document_id,
            success: false,
            chunks: None,
            error: Some(err.to_string()),
            downstream_error: None,
            document_uuid: None,
            stage: self.stage,
            stats: self.stats,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }

    fn finish(
        mut self,
        chunks: Vec<AnnotatedChunk>,
        downstream_error: Option<String>,
        document_uuid: Option<Uuid>,
    ) -> IngestResult {
        self.stage = IngestStage::Done;
        self.stats.total_ms = self.clock.elapsed().as_millis() as u64;
        info!(
            document_id = %self.document_id,
            chunks = self.stats.chunk_count,
            total_ms = self.stats.total_ms,
            degraded = downstream_error.is_some(),
            "Ingestion complete"
        );
        IngestResult {
            document_id: self.document_id,
            success: true,
            chunks: Some(chunks),
            error: None,
            downstream_error,
            document_uuid,
            stage: self.stage,
            stats: self.stats,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Run `future` under a time budget.
async fn within<T>(
    operation: &str,
    seconds: u64,
    future: impl Future<Output = AppResult<T>>,
) -> AppResult<T> {
    match tokio::time::timeout(Duration::from_secs(seconds), future).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout {
            operation: operation.to_string(),
            seconds,
        }),
    }
}

/// Document ingestion pipeline.
pub struct IngestPipeline {
    tokenizer: Arc<Tokenizer>,
    chunking: ChunkOptions,
    timeouts: TimeoutConfig,
    pacing: PacingPolicy,
    extractor: Option<Arc<dyn DocumentExtractor>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    store: Option<Arc<dyn VectorStore>>,
    http: reqwest::Client,
}

impl IngestPipeline {
    /// Pipeline with no embedding or storage collaborators.
    pub fn new(tokenizer: Arc<Tokenizer>, config: &IngestConfig) -> Self {
        Self {
            tokenizer,
            chunking: config.effective_chunking(),
            timeouts: config.timeouts,
            pacing: config.pacing.clone(),
            extractor: None,
            embedder: None,
            store: None,
            http: reqwest::Client::new(),
        }
    }

    /// Load the tokenizer and build every collaborator `config` enables.
    pub fn from_config(config: &IngestConfig, workspace: &Path) -> AppResult<Self> {
        let tokenizer = Arc::new(Tokenizer::cl100k()?);
        let mut pipeline = Self::new(tokenizer, config);
        if config.embedding.is_enabled() {
            pipeline = pipeline.with_embedder(create_provider(&config.embedding)?);
        }
        if config.store.is_enabled() {
            pipeline = pipeline.with_store(create_store(&config.store, workspace)?);
        }
        Ok(pipeline)
    }

    /// Use one extractor for every source instead of choosing by extension.
    pub fn with_extractor(mut self, extractor: Arc<dyn DocumentExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Ingest one document. Never panics or returns early: every outcome is
    /// described by the returned [`IngestResult`].
    #[instrument(skip_all, fields(document_id = %document_id, source = %source))]
    pub async fn ingest(
        &self,
        source: &SourceLocator,
        document_id: &str,
        options: &IngestOptions,
    ) -> IngestResult {
        let mut run = Tracker::new(document_id);
        info!("Starting ingestion");

        // Obtaining
        let local = match self.obtain(source).await {
            Ok(local) => local,
            Err(e) => return run.fail(e),
        };
        run.leave();

        // Extracting
        run.enter(IngestStage::Extracting);
        let raw = match self.extract(&local.path, document_id).await {
            Ok(raw) => raw,
            Err(e) => return run.fail(e),
        };
        run.stats.page_count = raw.page_count;
        run.stats.raw_chars = raw.text.chars().count();
        run.leave();

        // Cleaning
        run.enter(IngestStage::Cleaning);
        let (cleaned, report) = Normalizer::default().normalize_with_report(&raw.text);
        run.stats.cleaned_chars = cleaned.cleaned_text.chars().count();
        debug!(
            markers = report.markers_found,
            dropped_lines = report.dropped_lines,
            "Cleaning report"
        );
        run.leave();

        // Chunking
        run.enter(IngestStage::Chunking);
        let chunker = Chunker::new(self.tokenizer.clone(), self.chunk_options(options));
        let chunks = match chunker.chunk(&cleaned.cleaned_text, document_id, &cleaned.page_markers) {
            Ok(chunks) => chunks,
            Err(e) => return run.fail(e),
        };
        run.stats.chunk_count = chunks.len();
        run.leave();

        // Annotating
        run.enter(IngestStage::Annotating);
        let annotated = annotate(chunks, options.max_keywords);
        run.leave();

        let mut downstream_error = None;
        let mut document_uuid = None;

        let selected: Vec<&AnnotatedChunk> = if options.drop_low_quality {
            let kept: Vec<&AnnotatedChunk> = annotated
                .iter()
                .filter(|c| should_keep_chunk(&c.quality, options.quality_threshold))
                .collect();
            run.stats.dropped_low_quality = annotated.len() - kept.len();
            kept
        } else {
            annotated.iter().collect()
        };

        // Embedding
        let mut embeddings: Option<Vec<Vec<f32>>> = None;
        if options.embed {
            run.enter(IngestStage::Embedding);
            match self.embed(&selected).await {
                Ok(vectors) => {
                    run.stats.embedded_count = vectors.len();
                    embeddings = Some(vectors);
                }
                Err(e) => {
                    warn!("Embedding failed, keeping chunks: {}", e);
                    downstream_error = Some(e.to_string());
                }
            }
            run.leave();
        }

        // Storing
        if options.store && downstream_error.is_none() {
            run.enter(IngestStage::Storing);
            let meta = DocumentMeta {
                document_id: document_id.to_string(),
                source: source.to_string(),
                page_count: raw.page_count,
                chunk_count: annotated.len(),
                metadata: raw.metadata.clone(),
                ingested_at: Utc::now(),
            };
            match self.persist(&meta, &selected, embeddings).await {
                Ok((uuid, stored)) => {
                    document_uuid = Some(uuid);
                    run.stats.stored_count = stored;
                }
                Err(e) => {
                    warn!("Storage failed, keeping chunks: {}", e);
                    downstream_error = Some(e.to_string());
                }
            }
            run.leave();
        } else if options.store {
            warn!("Skipping storage after embedding failure");
        }

        run.finish(annotated, downstream_error, document_uuid)
    }

    /// Ingest documents one at a time, pacing between them.
    ///
    /// Returns one result per item, in order; a failed item never stops the batch.
    pub async fn ingest_batch(&self, items: &[BatchItem], options: &IngestOptions) -> Vec<IngestResult> {
        let mut pacer = Pacer::new(self.pacing.clone());
        let mut results = Vec::with_capacity(items.len());

        info!(documents = items.len(), "Starting batch ingestion");
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                pacer.pace().await;
            }
            info!(
                "Processing document {}/{}: {}",
                i + 1,
                items.len(),
                item.document_id
            );
            results.push(self.ingest(&item.source, &item.document_id, options).await);
        }

        let summary = BatchSummary::from_results(&results);
        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            downstream_failures = summary.downstream_failures,
            chunks = summary.chunks,
            "Batch complete"
        );
        results
    }

    /// Release the tokenizer and collaborators.
    pub fn shutdown(self) {
        let holders = Arc::strong_count(&self.tokenizer);
        drop(self.tokenizer);
        info!(
            tokenizer_refs_remaining = holders - 1,
            "Pipeline shut down, tokenizer released"
        );
    }

    fn chunk_options(&self, options: &IngestOptions) -> ChunkOptions {
        let mut chunking = options.chunking.clone().unwrap_or_else(|| self.chunking.clone());
        if options.embed {
            if let Some(embedder) = &self.embedder {
                chunking.embedding_max_tokens =
                    chunking.embedding_max_tokens.min(embedder.max_input_tokens());
            }
        }
        chunking
    }

    async fn obtain(&self, source: &SourceLocator) -> AppResult<LocalSource> {
        match source {
            SourceLocator::Path(path) => match tokio::fs::metadata(path).await {
                Ok(meta) if meta.is_file() => Ok(LocalSource {
                    path: path.clone(),
                    _download: None,
                }),
                Ok(_) => Err(AppError::SourceUnavailable(format!(
                    "{} is not a file",
                    path.display()
                ))),
                Err(e) => Err(AppError::SourceUnavailable(format!(
                    "Cannot access {}: {}",
                    path.display(),
                    e
                ))),
            },
            SourceLocator::Url(url) => {
                let file = within("download", self.timeouts.download_secs, self.download(url)).await?;
                Ok(LocalSource {
                    path: file.path().to_path_buf(),
                    _download: Some(file),
                })
            }
        }
    }

    #[instrument(skip(self))]
    async fn download(&self, url: &str) -> AppResult<NamedTempFile> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::SourceUnavailable(format!("Failed to fetch {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::SourceUnavailable(format!(
                "Fetching {} returned {}",
                url, status
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::SourceUnavailable(format!("Failed to read {}: {}", url, e)))?;

        let suffix = if url.to_ascii_lowercase().ends_with(".txt") {
            ".txt"
        } else {
            ".pdf"
        };
        let file = tempfile::Builder::new()
            .prefix("planscope-")
            .suffix(suffix)
            .tempfile()?;
        tokio::fs::write(file.path(), &bytes).await?;
        debug!(bytes = bytes.len(), path = %file.path().display(), "Downloaded source");
        Ok(file)
    }

    async fn extract(&self, path: &Path, document_id: &str) -> AppResult<RawDocument> {
        let extractor: Arc<dyn DocumentExtractor> = match &self.extractor {
            Some(extractor) => extractor.clone(),
            None => Arc::from(extractor_for(path)),
        };

        if !extractor.validate(path).await {
            return Err(AppError::SourceUnavailable(format!(
                "{} is not a valid {} document",
                path.display(),
                extractor.name()
            )));
        }

        let extracted = within("extract", self.timeouts.extract_secs, extractor.extract(path)).await?;
        Ok(RawDocument {
            document_id: document_id.to_string(),
            text: extracted.text,
            page_count: extracted.page_count,
            metadata: extracted.metadata,
        })
    }

    async fn embed(&self, chunks: &[&AnnotatedChunk]) -> AppResult<Vec<Vec<f32>>> {
        let embedder = self.embedder.as_ref().ok_or_else(|| {
            AppError::DownstreamUnavailable("No embedding provider configured".to_string())
        })?;
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.chunk.content.clone()).collect();
        info!(
            chunks = texts.len(),
            provider = embedder.provider_name(),
            model = embedder.model_name(),
            "Embedding chunks"
        );
        let vectors = within("embed", self.timeouts.embed_secs, embedder.embed_batch(&texts)).await?;
        if vectors.len() != texts.len() {
            return Err(AppError::DownstreamUnavailable(format!(
                "Provider returned {} embeddings for {} chunks",
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }

    async fn persist(
        &self,
        meta: &DocumentMeta,
        chunks: &[&AnnotatedChunk],
        embeddings: Option<Vec<Vec<f32>>>,
    ) -> AppResult<(Uuid, usize)> {
        let store = self.store.as_ref().ok_or_else(|| {
            AppError::DownstreamUnavailable("No vector store configured".to_string())
        })?;

        let uuid = within("store", self.timeouts.store_secs, store.upsert_document(meta)).await?;

        let mut vectors = embeddings.map(|v| v.into_iter());
        let records: Vec<VectorRecord> = chunks
            .iter()
            .map(|chunk| {
                let embedding = vectors.as_mut().and_then(|it| it.next());
                VectorRecord::from_chunk(chunk, uuid, embedding)
            })
            .collect();

        within("store", self.timeouts.store_secs, store.upsert(&records)).await?;
        info!(records = records.len(), store = store.name(), %uuid, "Stored chunks");
        Ok((uuid, records.len()))
    }
}

/// Score and tag every chunk.
pub fn annotate(chunks: Vec<TextChunk>, max_keywords: usize) -> Vec<AnnotatedChunk> {
    chunks
        .into_iter()
        .map(|chunk| {
            let quality = quality::score(&chunk.content);
            let keywords = keywords::extract(&chunk.content, max_keywords);
            AnnotatedChunk {
                chunk,
                quality,
                keywords,
            }
        })
        .collect()
}
