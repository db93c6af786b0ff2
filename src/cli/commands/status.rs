//! Status command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::error::LeseError;
use crate::vector_store::create_vector_store;
use anyhow::Result;

/// Run the status command.
///
/// Reads the store directly so no provider credentials are needed.
pub async fn run_status(settings: Settings) -> Result<()> {
    let store = create_vector_store(&settings)?;
    let collection = &settings.vector_store.collection;

    Output::header("Configuration");
    Output::kv("Store", &settings.vector_store.provider.to_string());
    Output::kv(
        "Embedding",
        &format!("{} ({}, {} dims)", settings.embedding.model, settings.embedding.provider, settings.embedding.dimensions),
    );
    Output::kv(
        "Generation",
        &format!("{} ({})", settings.generation.model, settings.generation.provider),
    );

    Output::header("Collection");
    match store.describe(collection).await {
        Ok(info) => {
            Output::collection_info(&info);
            if info.visible == 0 {
                println!();
                Output::info("Nothing indexed yet. Use 'lese ingest <source>' to add a book.");
            }
        }
        Err(LeseError::CollectionNotFound(_)) => {
            Output::info(&format!(
                "Collection '{}' does not exist yet. Use 'lese ingest <source>' to create it.",
                collection
            ));
        }
        Err(e) => {
            Output::error(&format!("Failed to read collection: {}", e));
            return Err(e.into());
        }
    }

    let others: Vec<_> = store
        .list_collections()
        .await?
        .into_iter()
        .filter(|info| &info.name != collection)
        .collect();
    if !others.is_empty() {
        Output::header(&format!("Other collections ({})", others.len()));
        for info in &others {
            Output::collection_info(info);
        }
    }

    Ok(())
}
