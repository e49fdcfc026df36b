//! Ingestion pipeline for government-plan PDFs.
//!
//! Turns a PDF (path or URL) into retrieval-ready chunks:
//! - `normalize`: repairs extraction damage and recovers page markers
//! - `chunk`: token-budgeted chunking with overlap and page attribution
//! - `quality` / `keywords`: per-chunk scoring, keywords and entities
//! - `pipeline`: stage orchestration, timeouts, optional embedding and storage

pub mod chunk;
pub mod config;
pub mod embeddings;
pub mod extract;
pub mod keywords;
pub mod lexicon;
pub mod normalize;
pub mod pacing;
pub mod pipeline;
pub mod quality;
pub mod store;
pub mod tokenizer;
pub mod types;

pub use chunk::{ChunkOptions, Chunker, SplitOn};
pub use config::{load_config, save_config, IngestConfig};
pub use embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
pub use extract::{DocumentExtractor, ExtractedDocument, PdfExtractor, PlainTextExtractor};
pub use normalize::{normalize, normalize_with_report, CleaningReport, Normalizer};
pub use pacing::{Pacer, PacingPolicy};
pub use pipeline::{BatchItem, BatchSummary, IngestOptions, IngestPipeline, SourceLocator};
pub use store::{DocumentMeta, JsonlStore, MemoryStore, VectorRecord, VectorStore};
pub use tokenizer::Tokenizer;
pub use types::{
    AnnotatedChunk, CleaningResult, IngestResult, IngestStage, IngestStats,
    KeywordExtractionResult, PageMarker, PageRange, QualityMetrics, RawDocument, TextChunk,
};
