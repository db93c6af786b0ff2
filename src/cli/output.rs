//! CLI output formatting utilities.

use crate::vector_store::{CollectionInfo, SearchResult};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print a collection's schema and counts.
    pub fn collection_info(info: &CollectionInfo) {
        println!(
            "  {} {} ({} dims, {}, {} visible, {} pending)",
            style("*").cyan(),
            style(&info.name).bold(),
            info.dimension,
            info.metric,
            info.visible,
            style(info.pending).dim()
        );
    }

    /// Print one ranked search result.
    pub fn search_result(rank: usize, result: &SearchResult) {
        println!(
            "\n{} {} {} (score: {:.2})",
            style(format!("[{}]", rank)).green(),
            style(&result.chunk.chunk().chapter).bold(),
            style(format!("page {}", result.chunk.chunk().page)).cyan(),
            result.score
        );
        println!("   {}", content_preview(result.chunk.text(), 200));
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner_style);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Truncate content with ellipsis, on a character boundary.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        let cut: String = content.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
