//! OpenAI chat completions.

use super::{GenerationRequest, Generator, Message, Role};
use crate::config::{GenerationSettings, ProviderCredentials};
use crate::error::{LeseError, Result};
use crate::openai::{classify_error, create_client, PROVIDER};
use crate::retry::{with_retry, RetryPolicy};
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Generator backed by the OpenAI chat API.
pub struct OpenAIGenerator {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    temperature: f32,
    policy: RetryPolicy,
}

impl OpenAIGenerator {
    pub fn new(
        settings: &GenerationSettings,
        credentials: &ProviderCredentials,
        policy: RetryPolicy,
    ) -> Result<Self> {
        Ok(Self {
            client: create_client(credentials, policy.timeout)?,
            model: settings.model.clone(),
            temperature: settings.temperature,
            policy,
        })
    }
}

fn build_error(e: impl std::fmt::Display) -> LeseError {
    LeseError::permanent(PROVIDER, format!("Failed to build request: {}", e))
}

/// Convert chat messages to the OpenAI request types.
fn to_openai_messages(messages: &[Message]) -> Result<Vec<ChatCompletionRequestMessage>> {
    messages
        .iter()
        .map(|m| {
            let message: ChatCompletionRequestMessage = match m.role {
                Role::System => ChatCompletionRequestSystemMessageArgs::default()
                    .content(m.content.clone())
                    .build()
                    .map_err(build_error)?
                    .into(),
                Role::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(m.content.clone())
                    .build()
                    .map_err(build_error)?
                    .into(),
                Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(m.content.clone())
                    .build()
                    .map_err(build_error)?
                    .into(),
            };
            Ok(message)
        })
        .collect()
}

#[async_trait]
impl Generator for OpenAIGenerator {
    #[instrument(skip(self, request), fields(messages = request.messages.len()))]
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let messages = to_openai_messages(&request.messages)?;
        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .build()
            .map_err(build_error)?;

        let client = &self.client;
        let chat_request = &chat_request;
        let response = with_retry(&self.policy, "openai generate", move || async move {
            client
                .chat()
                .create(chat_request.clone())
                .await
                .map_err(classify_error)
        })
        .await?;

        let answer = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| LeseError::permanent(PROVIDER, "Empty response from model"))?;

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

    #[test]
    fn test_message_conversion_keeps_order_and_roles() {
        let messages = vec![
            Message::system("Answer from context."),
            Message::user("Who is late?"),
            Message::assistant("The White Rabbit."),
            Message::user("Why?"),
        ];
        let converted = to_openai_messages(&messages).unwrap();

        assert_eq!(converted.len(), 4);
        assert!(matches!(converted[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(converted[2], ChatCompletionRequestMessage::Assistant(_)));
        assert!(matches!(converted[3], ChatCompletionRequestMessage::User(_)));
    }

    #[test]
    fn test_generator_uses_settings() {
        let creds = ProviderCredentials::new(Some("sk-test".to_string()), None);
        let generator =
            OpenAIGenerator::new(&GenerationSettings::default(), &creds, RetryPolicy::default()).unwrap();
        assert_eq!(generator.model(), "gpt-4o-mini");
        assert!((generator.temperature - 0.1).abs() < f32::EPSILON);
    }
}
