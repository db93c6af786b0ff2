//! Embedding generation for semantic search and retrieval.
//!
//! Every provider preserves input order, splits oversized inputs into
//! backend-sized batches and checks each returned vector's length before
//! handing it back.

mod ollama;
mod openai;

pub use ollama::{OllamaEmbedder, DEFAULT_OLLAMA_URL};
pub use openai::OpenAIEmbedder;

use crate::config::{EmbeddingSettings, NetworkSettings, ProviderCredentials, ProviderKind};
use crate::error::{LeseError, Result};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for embedding generation.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embeddings for multiple texts, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LeseError::permanent(self.name(), "Empty embedding response"))
    }

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Largest number of texts sent in one backend request.
    fn max_batch_size(&self) -> usize;

    /// Provider name for logs and errors.
    fn name(&self) -> &str;
}

/// Create the embedder named in settings.
pub fn create_embedder(
    settings: &EmbeddingSettings,
    network: &NetworkSettings,
    credentials: ProviderCredentials,
) -> Result<Arc<dyn Embedder>> {
    let policy = RetryPolicy::from_settings(network);
    let embedder: Arc<dyn Embedder> = match settings.provider {
        ProviderKind::OpenAI => Arc::new(OpenAIEmbedder::new(settings, &credentials, policy)?),
        ProviderKind::Ollama => Arc::new(OllamaEmbedder::new(settings, &credentials, policy)?),
    };
    Ok(embedder)
}

/// Check a backend response: one vector per input, each `dimensions` long.
pub(crate) fn check_vectors(
    provider: &str,
    expected_count: usize,
    dimensions: usize,
    vectors: Vec<Vec<f32>>,
) -> Result<Vec<Vec<f32>>> {
    if vectors.len() != expected_count {
        return Err(LeseError::permanent(
            provider,
            format!("Expected {} embeddings, got {}", expected_count, vectors.len()),
        ));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
        return Err(LeseError::permanent(
            provider,
            format!("Expected {}-dimensional embeddings, got {}", dimensions, bad.len()),
        ));
    }
    Ok(vectors)
}
