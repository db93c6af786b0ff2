//! OpenAI embeddings implementation.

use super::{check_vectors, Embedder};
use crate::config::{EmbeddingSettings, ProviderCredentials};
use crate::error::{LeseError, Result};
use crate::openai::{classify_error, create_client, PROVIDER};
use crate::retry::{with_retry, RetryPolicy};
use async_openai::types::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// OpenAI-based embedder.
pub struct OpenAIEmbedder {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    dimensions: usize,
    max_batch_size: usize,
    policy: RetryPolicy,
}

impl OpenAIEmbedder {
    /// Create a new OpenAI embedder.
    pub fn new(
        settings: &EmbeddingSettings,
        credentials: &ProviderCredentials,
        policy: RetryPolicy,
    ) -> Result<Self> {
        Ok(Self {
            client: create_client(credentials, policy.timeout)?,
            model: settings.model.clone(),
            dimensions: settings.dimensions,
            // The embeddings endpoint accepts at most 2048 inputs per request.
            max_batch_size: settings.max_batch_size.clamp(1, 2048),
            policy,
        })
    }

    /// One backend request, retried on transient failures.
    async fn request(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let client = &self.client;
        let model = self.model.as_str();
        let dimensions = self.dimensions as u32;

        let response = with_retry(&self.policy, "openai embed", move || async move {
            let request = CreateEmbeddingRequestArgs::default()
                .model(model)
                .input(EmbeddingInput::StringArray(batch.to_vec()))
                .dimensions(dimensions)
                .build()
                .map_err(|e| LeseError::permanent(PROVIDER, format!("Failed to build request: {}", e)))?;

            client.embeddings().create(request).await.map_err(classify_error)
        })
        .await?;

        // Sort by index to ensure correct order
        let mut embeddings: Vec<_> = response.data.into_iter().collect();
        embeddings.sort_by_key(|e| e.index);

        let vectors = embeddings.into_iter().map(|e| e.embedding).collect();
        check_vectors(PROVIDER, batch.len(), self.dimensions, vectors)
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.max_batch_size) {
            all_embeddings.extend(self.request(batch).await?);
        }

        debug!("Generated {} embeddings", all_embeddings.len());
        Ok(all_embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}
