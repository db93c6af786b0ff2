//! Ingest command implementation.

use super::build_pipeline;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;

/// Run the ingest command.
pub async fn run_ingest(
    source: &str,
    chunk_size: Option<usize>,
    clear: bool,
    settings: Settings,
) -> Result<()> {
    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Ingest, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'lese config show' to see which provider is configured.");
        return Err(e.into());
    }

    let chunk_size = chunk_size.unwrap_or(settings.chunking.chunk_size);
    let pipeline = build_pipeline(&settings)?;

    if clear {
        pipeline.clear().await?;
        Output::info(&format!("Cleared collection '{}'", pipeline.collection()));
    }

    let spinner = Output::spinner(&format!("Fetching and indexing {}...", source));

    match pipeline.ingest_identifier(source, chunk_size).await {
        Ok(report) => {
            spinner.finish_and_clear();

            if report.chunks == 0 {
                Output::warning(&format!("\"{}\" contained no text to index.", report.title));
                return Ok(());
            }

            Output::success(&format!("Indexed \"{}\"", report.title));
            Output::kv("Document", &report.document_id);
            Output::kv("Collection", &report.collection);
            Output::kv("Chunks", &report.chunks.to_string());
            Output::kv("Visible records", &report.visible.to_string());
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to ingest {}: {}", source, e));
            return Err(e.into());
        }
    }

    Ok(())
}
