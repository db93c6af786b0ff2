//! Pre-flight checks before expensive operations.
//!
//! Validates that required credentials are available before starting
//! operations that would otherwise fail midway, and resolves them from the
//! environment once so providers never read it themselves.

use crate::config::{ProviderCredentials, ProviderKind, Settings};
use crate::error::{LeseError, Result};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Ingestion embeds every chunk.
    Ingest,
    /// Search embeds the query.
    Search,
    /// Asking embeds the query and generates an answer.
    Ask,
    /// The server may do any of the above.
    Serve,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    let embedding = (settings.embedding.provider, settings.embedding.api_key_env.as_str());
    let generation = (settings.generation.provider, settings.generation.api_key_env.as_str());

    match operation {
        Operation::Ingest | Operation::Search => check_api_key(embedding.0, embedding.1),
        Operation::Ask | Operation::Serve => {
            check_api_key(embedding.0, embedding.1)?;
            check_api_key(generation.0, generation.1)
        }
    }
}

/// Credentials for the configured embedding provider.
pub fn embedding_credentials(settings: &Settings) -> ProviderCredentials {
    ProviderCredentials::from_env(
        &settings.embedding.api_key_env,
        settings.embedding.base_url.clone(),
    )
}

/// Credentials for the configured generation provider.
pub fn generation_credentials(settings: &Settings) -> ProviderCredentials {
    ProviderCredentials::from_env(
        &settings.generation.api_key_env,
        settings.generation.base_url.clone(),
    )
}

/// Check that a provider needing a key has one in its environment variable.
fn check_api_key(provider: ProviderKind, env_name: &str) -> Result<()> {
    if provider != ProviderKind::OpenAI {
        return Ok(());
    }

    match std::env::var(env_name) {
        Ok(key) if !key.trim().is_empty() => Ok(()),
        Ok(_) => Err(LeseError::Config(format!(
            "{} is empty. Set it with: export {}='sk-...'",
            env_name, env_name
        ))),
        Err(_) => Err(LeseError::Config(format!(
            "{} not set. Set it with: export {}='sk-...'",
            env_name, env_name
        ))),
    }
}
