//! OpenAI client configuration.

use crate::config::ProviderCredentials;
use crate::error::{LeseError, Result};
use async_openai::error::OpenAIError;
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Provider name used in errors and logs.
pub const PROVIDER: &str = "openai";

/// Create an OpenAI client from explicit credentials.
///
/// `request_timeout` bounds each HTTP request; the caller's retry policy
/// bounds the call as a whole.
pub fn create_client(
    credentials: &ProviderCredentials,
    request_timeout: Duration,
) -> Result<Client<OpenAIConfig>> {
    let api_key = credentials.api_key.as_deref().ok_or_else(|| {
        LeseError::Config("OpenAI API key is not set".to_string())
    })?;

    let http_client = reqwest::Client::builder().timeout(request_timeout).build()?;

    let mut config = OpenAIConfig::new().with_api_key(api_key);
    if let Some(base_url) = &credentials.base_url {
        config = config.with_api_base(base_url);
    }

    Ok(Client::with_config(config).with_http_client(http_client))
}

/// Map an OpenAI client error onto the transient/permanent split.
pub fn classify_error(err: OpenAIError) -> LeseError {
    match err {
        OpenAIError::Reqwest(e) => crate::retry::classify_transport(PROVIDER, e),
        OpenAIError::ApiError(api) => {
            let message = api.to_string();
            let lowered = message.to_lowercase();
            let transient = ["rate limit", "rate_limit", "server_error", "overloaded", "timeout"]
                .iter()
                .any(|marker| lowered.contains(marker));
            if transient {
                LeseError::transient(PROVIDER, message)
            } else {
                LeseError::permanent(PROVIDER, message)
            }
        }
        other => LeseError::permanent(PROVIDER, other.to_string()),
    }
}
