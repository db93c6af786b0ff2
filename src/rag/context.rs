//! Context formatting for RAG prompts and display.

use crate::vector_store::SearchResult;

/// Format retrieved chunks for a prompt, in rank order.
pub fn format_context_for_prompt(results: &[SearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, result)| format!("[{}] {}\n{}", i + 1, result.chunk.location(), result.chunk.text()))
        .collect::<Vec<_>>()
        .join("\n---\n")
}

/// Format retrieved chunks for display to the user.
pub fn format_sources_for_display(results: &[SearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            format!(
                "[{}] {} (score: {:.2})\n  {}",
                i + 1,
                result.chunk.location(),
                result.score,
                preview(result.chunk.text(), 160)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// First `max_chars` characters, with an ellipsis if cut.
fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}
