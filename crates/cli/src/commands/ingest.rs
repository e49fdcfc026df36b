//! Ingest command handler.
//!
//! Runs one document through the full pipeline.

use clap::Args;
use planscope_core::{config::AppConfig, AppError, AppResult};
use planscope_ingest::{
    load_config, IngestConfig, IngestOptions, IngestPipeline, IngestResult, SourceLocator,
};

use super::print_json;

/// Ingest a single PDF
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// PDF path or http(s) URL
    pub source: String,

    /// Document identifier used for chunk ids and storage
    #[arg(long)]
    pub id: String,

    /// Embed chunks with the configured provider
    #[arg(long)]
    pub embed: bool,

    /// Write chunks to the configured store
    #[arg(long)]
    pub store: bool,

    /// Keep low-quality chunks out of embedding and storage
    #[arg(long)]
    pub drop_low_quality: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Per-call options: configured defaults, switched on by flags.
pub(crate) fn resolve_options(
    config: &IngestConfig,
    embed: bool,
    store: bool,
    drop_low_quality: bool,
) -> IngestOptions {
    let mut options = IngestOptions::from_config(config);
    options.embed |= embed;
    options.store |= store;
    options.drop_low_quality |= drop_low_quality;
    options
}

/// One human-readable line per result.
pub(crate) fn describe(result: &IngestResult) -> String {
    if !result.success {
        return format!(
            "FAILED  {} at {}: {}",
            result.document_id,
            result.stage,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }

    let mut line = format!(
        "OK      {}: {} chunks from {} pages in {} ms",
        result.document_id, result.stats.chunk_count, result.stats.page_count, result.stats.total_ms
    );
    if result.stats.dropped_low_quality > 0 {
        line.push_str(&format!(
            " ({} low-quality chunks not stored)",
            result.stats.dropped_low_quality
        ));
    }
    if let Some(uuid) = result.document_uuid {
        line.push_str(&format!(", stored as {}", uuid));
    }
    if let Some(downstream) = &result.downstream_error {
        line.push_str(&format!("\n        warning: {}", downstream));
    }
    line
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command for '{}'", self.id);

        let ingest_config = load_config(&config.workspace)?;
        let options = resolve_options(&ingest_config, self.embed, self.store, self.drop_low_quality);
        tracing::debug!("Ingest options: {:?}", options);

        let source: SourceLocator = self.source.parse()?;
        let pipeline = IngestPipeline::from_config(&ingest_config, &config.workspace)?;
        let result = pipeline.ingest(&source, &self.id, &options).await;
        pipeline.shutdown();

        if self.json {
            print_json(&result)?;
        } else {
            println!("{}", describe(&result));
        }

        if result.success {
            Ok(())
        } else {
            Err(AppError::Other(format!("Ingestion of '{}' failed", self.id)))
        }
    }
}
