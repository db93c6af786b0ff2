//! RAG (Retrieval-Augmented Generation) for question answering with sources.
//!
//! The [`AnswerSynthesizer`] turns retrieved chunks into a grounded answer.
//! When retrieval finds nothing it reports [`Synthesis::InsufficientContext`]
//! instead of asking the model to guess.

pub mod context;
mod synthesizer;

pub use context::{format_context_for_prompt, format_sources_for_display};
pub use synthesizer::AnswerSynthesizer;

use crate::generation::Message;
use crate::vector_store::SearchResult;
use serde::{Deserialize, Serialize};

/// Fixed reply used when no context was retrieved.
pub const INSUFFICIENT_CONTEXT: &str =
    "I don't have enough information in the indexed text to answer that question.";

/// Maximum number of turns kept in a conversation.
const MAX_HISTORY_TURNS: usize = 20;

/// One earlier message in a conversation.
pub type Turn = Message;

/// Outcome of answer synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Synthesis {
    /// Answer written from retrieved context.
    Grounded(String),
    /// Nothing was retrieved; no answer was attempted.
    InsufficientContext,
}

impl Synthesis {
    /// Answer text, or the insufficient-context marker.
    pub fn text(&self) -> &str {
        match self {
            Synthesis::Grounded(answer) => answer,
            Synthesis::InsufficientContext => INSUFFICIENT_CONTEXT,
        }
    }

    pub fn is_grounded(&self) -> bool {
        matches!(self, Synthesis::Grounded(_))
    }
}

/// An answer with the sources used to write it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub question: String,
    /// The generated answer.
    pub answer: String,
    /// Exactly the retrieved chunks given to the model, in rank order.
    pub sources: Vec<SearchResult>,
    /// False when the answer is the insufficient-context marker.
    pub grounded: bool,
}

impl Answer {
    pub fn new(question: &str, synthesis: Synthesis, sources: Vec<SearchResult>) -> Self {
        Self {
            question: question.to_string(),
            answer: synthesis.text().to_string(),
            grounded: synthesis.is_grounded(),
            sources,
        }
    }

    /// Format the answer for display.
    pub fn format_for_display(&self) -> String {
        let mut output = self.answer.clone();

        if !self.sources.is_empty() {
            output.push_str("\n\n--- Sources ---\n\n");
            output.push_str(&format_sources_for_display(&self.sources));
        }

        output
    }
}

/// Caller-owned chat history, capped at the most recent turns.
///
/// The pipeline never stores one; callers pass it into each ask.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from existing turns, keeping only the most recent ones.
    pub fn from_turns(turns: Vec<Turn>) -> Self {
        let mut conversation = Self { turns };
        conversation.trim();
        conversation
    }

    /// Record a completed question and answer.
    pub fn record(&mut self, question: &str, answer: &Answer) {
        self.turns.push(Message::user(question));
        self.turns.push(Message::assistant(answer.answer.clone()));
        self.trim();
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    fn trim(&mut self) {
        if self.turns.len() > MAX_HISTORY_TURNS {
            let excess = self.turns.len() - MAX_HISTORY_TURNS;
            self.turns.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::Role;

    #[test]
    fn test_insufficient_context_text() {
        let answer = Answer::new("Who?", Synthesis::InsufficientContext, Vec::new());
        assert_eq!(answer.answer, INSUFFICIENT_CONTEXT);
        assert!(!answer.grounded);
        assert_eq!(answer.format_for_display(), INSUFFICIENT_CONTEXT);
    }

    #[test]
    fn test_conversation_keeps_recent_turns() {
        let mut conversation = Conversation::new();
        for i in 0..15 {
            let answer = Answer::new("q", Synthesis::Grounded(format!("a{}", i)), Vec::new());
            conversation.record(&format!("q{}", i), &answer);
        }

        assert_eq!(conversation.len(), 20);
        assert_eq!(conversation.turns()[0], Message::user("q5"));
        assert_eq!(conversation.turns()[19].role, Role::Assistant);
        assert_eq!(conversation.turns()[19].content, "a14");
    }

    #[test]
    fn test_conversation_deserializes_from_turn_list() {
        let conversation: Conversation = serde_json::from_str(
            r#"[{"role":"user","content":"Who is late?"},{"role":"assistant","content":"The Rabbit."}]"#,
        )
        .unwrap();
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.turns()[1], Message::assistant("The Rabbit."));
    }
}
