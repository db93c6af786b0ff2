//! Grounded answer synthesis.

use super::{context::format_context_for_prompt, Synthesis, Turn};
use crate::config::Prompts;
use crate::error::Result;
use crate::generation::{GenerationRequest, Generator, Message};
use crate::vector_store::SearchResult;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Writes answers from retrieved context with one generator call each.
pub struct AnswerSynthesizer {
    generator: Arc<dyn Generator>,
    prompts: Prompts,
}

impl AnswerSynthesizer {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            generator,
            prompts: Prompts::default(),
        }
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Answer `question` from `results` alone.
    pub async fn synthesize(&self, question: &str, results: &[SearchResult]) -> Result<Synthesis> {
        self.synthesize_with_history(question, results, &[]).await
    }

    /// Answer with earlier turns placed between the system prompt and the question.
    #[instrument(skip(self, results, history), fields(sources = results.len(), history = history.len()))]
    pub async fn synthesize_with_history(
        &self,
        question: &str,
        results: &[SearchResult],
        history: &[Turn],
    ) -> Result<Synthesis> {
        if results.is_empty() {
            info!("No context retrieved; skipping generation");
            return Ok(Synthesis::InsufficientContext);
        }

        let request = self.build_request(question, results, history);
        let answer = self.generator.generate(&request).await?;

        debug!("Generated answer from {} sources", results.len());
        Ok(Synthesis::Grounded(answer))
    }

    /// Build the prompt: system, history, then the question with its context.
    pub fn build_request(
        &self,
        question: &str,
        results: &[SearchResult],
        history: &[Turn],
    ) -> GenerationRequest {
        let mut vars = HashMap::new();
        vars.insert("question".to_string(), question.to_string());
        vars.insert("context".to_string(), format_context_for_prompt(results));

        let system = self.prompts.render_with_custom(&self.prompts.rag.system, &HashMap::new());
        let user = self.prompts.render_with_custom(&self.prompts.rag.user, &vars);

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(system));
        messages.extend(history.iter().cloned());
        messages.push(Message::user(user));

        GenerationRequest::new(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::Chunk;
    use crate::error::LeseError;
    use crate::generation::Role;
    use crate::vector_store::EmbeddedChunk;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every request and replies with a fixed answer.
    #[derive(Default)]
    struct Recorder {
        requests: Mutex<Vec<GenerationRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl Generator for Recorder {
        async fn generate(&self, request: &GenerationRequest) -> Result<String> {
            self.requests.lock().unwrap().push(request.clone());
            if self.fail {
                return Err(LeseError::permanent("recorder", "401 unauthorized"));
            }
            Ok("Dogs run.".to_string())
        }

        fn model(&self) -> &str {
            "recorder"
        }

        fn name(&self) -> &str {
            "recorder"
        }
    }

    fn result(text: &str) -> SearchResult {
        SearchResult {
            chunk: EmbeddedChunk::new(
                Chunk {
                    text: text.to_string(),
                    chapter: "Chapter 1".to_string(),
                    page: 2,
                    source_offset: 12,
                },
                vec![0.0, 1.0],
            ),
            score: 0.98,
        }
    }

    #[tokio::test]
    async fn test_no_results_skips_generator() {
        let recorder = Arc::new(Recorder::default());
        let synthesizer = AnswerSynthesizer::new(recorder.clone());

        let synthesis = synthesizer.synthesize("What do dogs do?", &[]).await.unwrap();
        assert_eq!(synthesis, Synthesis::InsufficientContext);
        assert_eq!(synthesis.text(), crate::rag::INSUFFICIENT_CONTEXT);
        assert!(recorder.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prompt_contains_context_and_question() {
        let recorder = Arc::new(Recorder::default());
        let synthesizer = AnswerSynthesizer::new(recorder.clone());

        let synthesis = synthesizer
            .synthesize("What do dogs do?", &[result("Dogs run.")])
            .await
            .unwrap();
        assert_eq!(synthesis, Synthesis::Grounded("Dogs run.".to_string()));

        let requests = recorder.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let messages = &requests[0].messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[1].content.contains("[1] Chapter 1, page 2\nDogs run."));
        assert!(messages[1].content.contains("Question: What do dogs do?"));
        assert!(!messages[1].content.contains("{{"));
    }

    #[test]
    fn test_placeholders_in_book_text_stay_literal() {
        let synthesizer = AnswerSynthesizer::new(Arc::new(Recorder::default()));
        let results = [result("Use {{question}} here.")];

        let first = synthesizer.build_request("Q?", &results, &[]);
        assert!(first.messages[1].content.contains("Use {{question}} here."));
        assert!(first.messages[1].content.ends_with("Question: Q?\n\nAnswer:"));
        for _ in 0..50 {
            assert_eq!(synthesizer.build_request("Q?", &results, &[]), first);
        }
    }

    #[tokio::test]
    async fn test_history_sits_between_system_and_question() {
        let recorder = Arc::new(Recorder::default());
        let synthesizer = AnswerSynthesizer::new(recorder.clone());
        let history = vec![Message::user("Who sleeps?"), Message::assistant("Cats sleep.")];

        synthesizer
            .synthesize_with_history("And dogs?", &[result("Dogs run.")], &history)
            .await
            .unwrap();

        let requests = recorder.requests.lock().unwrap();
        let roles: Vec<Role> = requests[0].messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(requests[0].messages[1].content, "Who sleeps?");
    }

    #[tokio::test]
    async fn test_generator_errors_propagate() {
        let recorder = Arc::new(Recorder {
            fail: true,
            ..Default::default()
        });
        let synthesizer = AnswerSynthesizer::new(recorder);

        let result = synthesizer.synthesize("What do dogs do?", &[result("Dogs run.")]).await;
        assert!(matches!(result, Err(LeseError::Provider { .. })));
    }

    #[test]
    fn test_custom_variables_reach_prompt() {
        let mut prompts = Prompts::default();
        prompts.rag.system = "You are discussing {{book}}.".to_string();
        prompts.variables.insert("book".to_string(), "Alice".to_string());

        let synthesizer = AnswerSynthesizer::new(Arc::new(Recorder::default())).with_prompts(prompts);
        let request = synthesizer.build_request("Who?", &[result("Alice fell.")], &[]);
        assert_eq!(request.messages[0].content, "You are discussing Alice.");
    }
}
