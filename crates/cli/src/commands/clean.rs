//! Clean command handler.
//!
//! Extracts a document and prints the normalized text with its page markers.

use clap::Args;
use planscope_core::AppResult;
use planscope_ingest::normalize_with_report;
use std::path::PathBuf;

use super::{extract_local, print_json};

/// Print the cleaned text of a PDF or text file
#[derive(Args, Debug)]
pub struct CleanCommand {
    /// File to clean (.pdf, or anything else as plain text)
    pub file: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl CleanCommand {
    pub async fn execute(&self) -> AppResult<()> {
        tracing::info!("Executing clean command for {:?}", self.file);

        let extracted = extract_local(&self.file).await?;
        let (result, report) = normalize_with_report(&extracted.text);
        tracing::debug!("Cleaning report: {:?}", report);

        if self.json {
            print_json(&serde_json::json!({
                "cleanedText": result.cleaned_text,
                "pageMarkers": result.page_markers,
                "report": report,
            }))?;
        } else {
            println!("{}", result.cleaned_text);
            eprintln!(
                "\n{} chars, {} page markers, {} lines dropped, {} encoding repairs",
                result.cleaned_text.chars().count(),
                result.page_markers.len(),
                report.dropped_lines,
                report.encoding_repairs
            );
            for marker in &result.page_markers {
                eprintln!(
                    "  page {}/{} at byte {}",
                    marker.page_number, marker.total_pages, marker.position
                );
            }
        }

        Ok(())
    }
}
