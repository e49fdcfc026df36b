//! Chunk command handler.
//!
//! Extracts, cleans and chunks a document locally, then prints every chunk
//! with its quality score and keywords. Nothing is embedded or stored.

use clap::Args;
use planscope_core::{config::AppConfig, AppResult};
use planscope_ingest::pipeline::annotate;
use planscope_ingest::{load_config, normalize, ChunkOptions, Chunker, SplitOn, Tokenizer};
use std::path::PathBuf;
use std::sync::Arc;

use super::{extract_local, print_json};

/// Show how a document would be chunked
#[derive(Args, Debug)]
pub struct ChunkCommand {
    /// File to chunk (.pdf, or anything else as plain text)
    pub file: PathBuf,

    /// Document identifier for chunk ids (default: file stem)
    #[arg(long)]
    pub id: Option<String>,

    /// Target tokens per chunk
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Hard token ceiling per chunk
    #[arg(long)]
    pub max_chunk_size: Option<usize>,

    /// Tokens carried over between consecutive chunks
    #[arg(long)]
    pub overlap: Option<usize>,

    /// Preferred boundary: paragraph, sentence or word
    #[arg(long)]
    pub split_on: Option<SplitOn>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ChunkCommand {
    fn options(&self, base: ChunkOptions) -> ChunkOptions {
        ChunkOptions {
            chunk_size: self.chunk_size.unwrap_or(base.chunk_size),
            max_chunk_size: self.max_chunk_size.unwrap_or(base.max_chunk_size),
            overlap_size: self.overlap.unwrap_or(base.overlap_size),
            split_on: self.split_on.unwrap_or(base.split_on),
            embedding_max_tokens: base.embedding_max_tokens,
        }
    }

    fn document_id(&self) -> String {
        self.id.clone().unwrap_or_else(|| {
            self.file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "document".to_string())
        })
    }

    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chunk command for {:?}", self.file);

        let ingest_config = load_config(&config.workspace)?;
        let options = self.options(ingest_config.effective_chunking());
        tracing::debug!("Chunk options: {:?}", options);

        let extracted = extract_local(&self.file).await?;
        let cleaned = normalize(&extracted.text);

        let tokenizer = Arc::new(Tokenizer::cl100k()?);
        let chunker = Chunker::new(tokenizer, options);
        let document_id = self.document_id();
        let chunks = chunker.chunk(&cleaned.cleaned_text, &document_id, &cleaned.page_markers)?;
        let annotated = annotate(chunks, ingest_config.keywords.max_keywords);

        if self.json {
            return print_json(&annotated);
        }

        for item in &annotated {
            let chunk = &item.chunk;
            let pages = match (chunk.page_number, chunk.page_range) {
                (Some(page), _) => format!("p. {}", page),
                (None, Some(range)) => format!("pp. {}-{}", range.start, range.end),
                (None, None) => "-".to_string(),
            };
            println!(
                "== {} | {} tokens | {} | quality {:.2}",
                chunk.chunk_id, chunk.tokens, pages, item.quality.quality_score
            );
            if !item.keywords.keywords.is_empty() {
                println!("   keywords: {}", item.keywords.keywords.join(", "));
            }
            if !item.keywords.entities.is_empty() {
                let entities: Vec<&str> = item.keywords.entities.iter().map(String::as_str).collect();
                println!("   entities: {}", entities.join(", "));
            }
            println!("{}\n", chunk.content);
        }
        eprintln!("{} chunks", annotated.len());

        Ok(())
    }
}
