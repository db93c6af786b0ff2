//! Ask command implementation.

use super::build_pipeline;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::LeseError;
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(question: &str, top_k: Option<usize>, settings: Settings) -> Result<()> {
    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'lese config show' to see which provider is configured.");
        return Err(e.into());
    }

    let top_k = top_k.unwrap_or(settings.retrieval.top_k);
    let pipeline = build_pipeline(&settings)?;

    let spinner = Output::spinner("Searching the indexed text...");

    match pipeline.ask(question, top_k).await {
        Ok(answer) => {
            spinner.finish_and_clear();

            println!("\n{}\n", answer.answer);

            if !answer.grounded {
                Output::warning("No passages were retrieved for this question.");
            }

            if !answer.sources.is_empty() {
                Output::header("Sources");
                for (i, source) in answer.sources.iter().enumerate() {
                    Output::search_result(i + 1, source);
                }
            }
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to generate answer: {}", e));
            if matches!(e, LeseError::EmptyCollection(_) | LeseError::CollectionNotFound(_)) {
                Output::info("Index a book first with 'lese ingest <source>'.");
            }
            return Err(e.into());
        }
    }

    Ok(())
}
