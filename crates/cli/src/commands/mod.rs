//! Command handlers for the Planscope CLI.

pub mod batch;
pub mod chunk;
pub mod clean;
pub mod ingest;

pub use batch::BatchCommand;
pub use chunk::ChunkCommand;
pub use clean::CleanCommand;
pub use ingest::IngestCommand;

use planscope_core::AppResult;
use planscope_ingest::{DocumentExtractor, ExtractedDocument};
use serde::Serialize;
use std::path::Path;

/// Write `value` to stdout as pretty JSON.
pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Extract a local file with the extractor its extension calls for.
pub(crate) async fn extract_local(path: &Path) -> AppResult<ExtractedDocument> {
    let extractor = planscope_ingest::extract::extractor_for(path);
    tracing::debug!(extractor = extractor.name(), "Extracting {:?}", path);
    extractor.extract(path).await
}
