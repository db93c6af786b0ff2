//! Search command implementation.

use super::build_pipeline;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(query: &str, top_k: Option<usize>, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Search, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let top_k = top_k.unwrap_or(settings.retrieval.top_k);
    let pipeline = build_pipeline(&settings)?;

    let spinner = Output::spinner("Searching...");
    let results = pipeline.search(query, top_k).await;
    spinner.finish_and_clear();

    match results {
        Ok(results) => {
            Output::header(&format!("Results for \"{}\" ({})", query, results.len()));
            for (i, result) in results.iter().enumerate() {
                Output::search_result(i + 1, result);
            }
            println!();
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
