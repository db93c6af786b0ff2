//! Ollama embeddings implementation (`POST /api/embed`).

use super::{check_vectors, Embedder};
use crate::config::{EmbeddingSettings, ProviderCredentials};
use crate::error::{LeseError, Result};
use crate::retry::{classify_status, classify_transport, with_retry, RetryPolicy};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const PROVIDER: &str = "ollama";

/// Default local Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embedder backed by a local or remote Ollama server.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
    max_batch_size: usize,
    policy: RetryPolicy,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder.
    pub fn new(
        settings: &EmbeddingSettings,
        credentials: &ProviderCredentials,
        policy: RetryPolicy,
    ) -> Result<Self> {
        let base_url = credentials
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_OLLAMA_URL)
            .trim_end_matches('/');

        Ok(Self {
            client: reqwest::Client::builder().timeout(policy.timeout).build()?,
            url: format!("{}/api/embed", base_url),
            api_key: credentials.api_key.clone(),
            model: settings.model.clone(),
            dimensions: settings.dimensions,
            max_batch_size: settings.max_batch_size.max(1),
            policy,
        })
    }

    async fn request(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = &EmbedRequest {
            model: &self.model,
            input: batch,
        };
        let client = &self.client;
        let url = self.url.as_str();
        let api_key = self.api_key.as_deref();

        let response = with_retry(&self.policy, "ollama embed", move || async move {
            let mut request = client.post(url).json(body);
            if let Some(key) = api_key {
                request = request.bearer_auth(key);
            }

            let response = request
                .send()
                .await
                .map_err(|e| classify_transport(PROVIDER, e))?;

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(classify_status(PROVIDER, status, &text));
            }

            response
                .json::<EmbedResponse>()
                .await
                .map_err(|e| LeseError::permanent(PROVIDER, format!("Malformed response: {}", e)))
        })
        .await?;

        check_vectors(PROVIDER, batch.len(), self.dimensions, response.embeddings)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.max_batch_size) {
            all_embeddings.extend(self.request(batch).await?);
        }

        debug!("Generated {} embeddings with {}", all_embeddings.len(), self.model);
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
