//! Clear command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::error::LeseError;
use crate::vector_store::create_vector_store;
use anyhow::Result;

/// Run the clear command.
///
/// Recreates the collection with the configured embedding dimensions.
pub async fn run_clear(settings: Settings) -> Result<()> {
    let store = create_vector_store(&settings)?;
    let collection = &settings.vector_store.collection;

    match store.drop_collection(collection).await {
        Ok(()) | Err(LeseError::CollectionNotFound(_)) => {}
        Err(e) => {
            Output::error(&format!("Failed to drop collection: {}", e));
            return Err(e.into());
        }
    }

    let info = store
        .create_collection(collection, settings.embedding.dimensions, settings.vector_store.metric)
        .await?;

    Output::success(&format!("Cleared collection '{}'", info.name));
    Output::collection_info(&info);

    Ok(())
}
