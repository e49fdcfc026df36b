//! Batch command handler.
//!
//! Ingests many documents in order, from a YAML manifest or a directory scan.

use clap::Args;
use planscope_core::{config::AppConfig, AppError, AppResult};
use planscope_ingest::{load_config, BatchItem, BatchSummary, IngestPipeline, SourceLocator};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::ingest::{describe, resolve_options};
use super::print_json;

/// Ingest several PDFs
#[derive(Args, Debug)]
pub struct BatchCommand {
    /// YAML manifest listing sources and document ids
    #[arg(required_unless_present = "dir")]
    pub manifest: Option<PathBuf>,

    /// Ingest every PDF under this directory instead
    #[arg(long, conflicts_with = "manifest")]
    pub dir: Option<PathBuf>,

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

/// Manifest file layout:
///
/// ```yaml
/// documents:
///   - source: planes/pln.pdf
///     id: pln
///   - source: https://example.org/pusc.pdf
/// ```
#[derive(Debug, Deserialize)]
struct Manifest {
    documents: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    source: String,
    /// Defaults to the source's file stem
    id: Option<String>,
}

fn file_stem(source: &str) -> Option<String> {
    let name = source.rsplit(&['/', '\\'][..]).next()?;
    let stem = Path::new(name).file_stem()?.to_str()?;
    (!stem.is_empty()).then(|| stem.to_string())
}

/// Read a manifest; relative paths resolve against its directory.
fn load_manifest(path: &Path) -> AppResult<Vec<BatchItem>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!("Failed to read manifest {:?}: {}", path, e))
    })?;
    let manifest: Manifest = serde_yaml::from_str(&content).map_err(|e| {
        AppError::Config(format!("Failed to parse manifest {:?}: {}", path, e))
    })?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    manifest
        .documents
        .into_iter()
        .map(|entry| {
            let source = match entry.source.parse::<SourceLocator>()? {
                SourceLocator::Path(p) if p.is_relative() => SourceLocator::Path(base.join(p)),
                other => other,
            };
            let document_id = entry
                .id
                .or_else(|| file_stem(&entry.source))
                .ok_or_else(|| {
                    AppError::Config(format!("No document id for source '{}'", entry.source))
                })?;
            Ok(BatchItem {
                source,
                document_id,
            })
        })
        .collect()
}

/// Every `*.pdf` under `dir`, sorted by path, id = file stem.
fn scan_dir(dir: &Path) -> AppResult<Vec<BatchItem>> {
    if !dir.is_dir() {
        return Err(AppError::SourceUnavailable(format!(
            "{:?} is not a directory",
            dir
        )));
    }

    let mut items = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| AppError::Other(format!("Failed to walk {:?}: {}", dir, e)))?;
        let path = entry.path();
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if !entry.file_type().is_file() || !is_pdf {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            tracing::warn!("Skipping {:?}: file name is not UTF-8", path);
            continue;
        };
        items.push(BatchItem {
            source: SourceLocator::Path(path.to_path_buf()),
            document_id: stem.to_string(),
        });
    }
    Ok(items)
}

impl BatchCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let items = match (&self.manifest, &self.dir) {
            (Some(manifest), _) => load_manifest(manifest)?,
            (None, Some(dir)) => scan_dir(dir)?,
            (None, None) => {
                return Err(AppError::Config(
                    "Provide a manifest file or --dir".to_string(),
                ))
            }
        };
        tracing::info!("Executing batch command for {} documents", items.len());

        let ingest_config = load_config(&config.workspace)?;
        let options = resolve_options(&ingest_config, self.embed, self.store, self.drop_low_quality);
        let pipeline = IngestPipeline::from_config(&ingest_config, &config.workspace)?;
        let results = pipeline.ingest_batch(&items, &options).await;
        pipeline.shutdown();

        let summary = BatchSummary::from_results(&results);
        if self.json {
            print_json(&serde_json::json!({
                "summary": summary,
                "results": results,
            }))?;
        } else {
            for result in &results {
                println!("{}", describe(result));
            }
            println!(
                "\n{} documents: {} succeeded, {} failed, {} degraded, {} chunks",
                summary.total,
                summary.succeeded,
                summary.failed,
                summary.downstream_failures,
                summary.chunks
            );
        }

        if summary.failed > 0 {
            return Err(AppError::Other(format!(
                "{} of {} documents failed",
                summary.failed, summary.total
            )));
        }
        Ok(())
    }
}
