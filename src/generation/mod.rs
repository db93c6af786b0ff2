//! Text generation backends used to write grounded answers.

mod ollama;
mod openai;

pub use ollama::OllamaGenerator;
pub use openai::OpenAIGenerator;

use crate::config::{GenerationSettings, NetworkSettings, ProviderCredentials, ProviderKind};
use crate::error::Result;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A single stateless completion request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationRequest {
    pub messages: Vec<Message>,
}

impl GenerationRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

/// Trait for chat completion backends.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce the assistant's reply. An empty reply is an error.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Model used for completions.
    fn model(&self) -> &str;

    /// Provider name for logs and errors.
    fn name(&self) -> &str;
}

/// Create the generator named in settings.
pub fn create_generator(
    settings: &GenerationSettings,
    network: &NetworkSettings,
    credentials: ProviderCredentials,
) -> Result<Arc<dyn Generator>> {
    let policy = RetryPolicy::from_settings(network);
    let generator: Arc<dyn Generator> = match settings.provider {
        ProviderKind::OpenAI => Arc::new(OpenAIGenerator::new(settings, &credentials, policy)?),
        ProviderKind::Ollama => Arc::new(OllamaGenerator::new(settings, &credentials, policy)?),
    };
    Ok(generator)
}
