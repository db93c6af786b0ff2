//! Ollama chat completions (`POST /api/chat`, non-streaming).

use super::{GenerationRequest, Generator, Message};
use crate::config::{GenerationSettings, ProviderCredentials};
use crate::embedding::DEFAULT_OLLAMA_URL;
use crate::error::{LeseError, Result};
use crate::retry::{classify_status, classify_transport, with_retry, RetryPolicy};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const PROVIDER: &str = "ollama";

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    options: ChatOptions,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

/// Generator backed by an Ollama server.
pub struct OllamaGenerator {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    policy: RetryPolicy,
}

impl OllamaGenerator {
    pub fn new(
        settings: &GenerationSettings,
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
            url: format!("{}/api/chat", base_url),
            api_key: credentials.api_key.clone(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            policy,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    #[instrument(skip(self, request), fields(messages = request.messages.len()))]
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let body = &ChatRequest {
            model: &self.model,
            messages: &request.messages,
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
            },
        };
        let client = &self.client;
        let url = self.url.as_str();
        let api_key = self.api_key.as_deref();

        let response = with_retry(&self.policy, "ollama generate", move || async move {
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
                .json::<ChatResponse>()
                .await
                .map_err(|e| LeseError::permanent(PROVIDER, format!("Malformed response: {}", e)))
        })
        .await?;

        let answer = response.message.content.trim().to_string();
        if answer.is_empty() {
            return Err(LeseError::permanent(PROVIDER, "Empty response from model"));
        }

        debug!("Generated {} characters with {}", answer.len(), self.model);
        Ok(answer)
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::time::Duration;

    async fn spawn(reply: &'static str) -> String {
        let app = Router::new().route(
            "/api/chat",
            post(move |Json(body): Json<Value>| async move {
                assert_eq!(body["stream"], json!(false));
                let turns = body["messages"].as_array().map(|m| m.len()).unwrap_or_default();
                let content = reply.replace("{turns}", &turns.to_string());
                Json(json!({ "message": { "role": "assistant", "content": content }, "done": true }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    fn generator(url: String) -> OllamaGenerator {
        OllamaGenerator::new(
            &GenerationSettings::default(),
            &ProviderCredentials::new(None, Some(url)),
            RetryPolicy::no_retry(Duration::from_secs(10)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_generate_sends_all_messages() {
        let url = spawn("saw {turns} messages").await;
        let request = GenerationRequest::new(vec![Message::system("Be brief."), Message::user("Hi")]);

        let answer = generator(url).generate(&request).await.unwrap();
        assert_eq!(answer, "saw 2 messages");
    }

    #[tokio::test]
    async fn test_empty_reply_is_permanent_error() {
        let url = spawn("   ").await;
        let request = GenerationRequest::new(vec![Message::user("Hi")]);

        let result = generator(url).generate(&request).await;
        assert!(matches!(result, Err(LeseError::Provider { transient: false, .. })));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transient() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let request = GenerationRequest::new(vec![Message::user("Hi")]);
        let result = generator(format!("http://{}", addr)).generate(&request).await;
        assert!(result.unwrap_err().is_transient());
    }
}
