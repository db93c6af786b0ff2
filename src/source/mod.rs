//! Document sources for Lese.
//!
//! Provides a trait-based interface for fetching book text from Project
//! Gutenberg, arbitrary URLs and local files.

mod file;
mod gutenberg;
mod http;

pub use file::FileSource;
pub use gutenberg::{GutenbergSource, GUTENBERG_BASE_URL};
pub use http::HttpSource;

use crate::error::{LeseError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Type of document source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Gutenberg,
    Http,
    File,
    /// Text supplied directly by the caller.
    Inline,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Gutenberg => write!(f, "gutenberg"),
            SourceType::Http => write!(f, "http"),
            SourceType::File => write!(f, "file"),
            SourceType::Inline => write!(f, "inline"),
        }
    }
}

/// Raw text of one document. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Identifier derived from the source.
    pub id: String,
    pub title: String,
    pub text: String,
    /// URL or path the text came from.
    pub source: String,
    pub source_type: SourceType,
}

impl Document {
    /// Wrap caller-supplied text.
    pub fn inline(title: &str, text: impl Into<String>) -> Self {
        Self {
            id: format!("inline_{}", slug(title)),
            title: title.to_string(),
            text: text.into(),
            source: "inline".to_string(),
            source_type: SourceType::Inline,
        }
    }
}

/// Trait for document source providers.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Get the source type.
    fn source_type(&self) -> SourceType;

    /// Fetch a document by identifier (book id, URL or path).
    async fn fetch(&self, identifier: &str) -> Result<Document>;

    /// Check if this source can handle the given input.
    fn can_handle(&self, input: &str) -> bool;
}

/// Pick the source for an identifier: digits are Gutenberg book ids,
/// http(s) URLs are fetched directly, anything else is a local path.
pub fn detect_source(input: &str, timeout: Duration) -> Result<Box<dyn DocumentSource>> {
    match detect_remote_source(input, timeout) {
        Err(LeseError::InvalidInput(_)) => Ok(Box::new(FileSource::new())),
        other => other,
    }
}

/// Like [`detect_source`], but rejects local paths with `InvalidInput`.
pub fn detect_remote_source(input: &str, timeout: Duration) -> Result<Box<dyn DocumentSource>> {
    let gutenberg = GutenbergSource::new(HttpSource::new(timeout)?);
    if gutenberg.can_handle(input) {
        return Ok(Box::new(gutenberg));
    }

    let http = HttpSource::new(timeout)?;
    if http.can_handle(input) {
        return Ok(Box::new(http));
    }

    Err(LeseError::InvalidInput(format!(
        "'{}' is neither a Gutenberg book id nor an http(s) URL",
        input
    )))
}

/// Lowercase alphanumeric slug for identifiers.
fn slug(text: &str) -> String {
    let slug: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let slug = slug.split('_').filter(|s| !s.is_empty()).collect::<Vec<_>>().join("_");
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

/// Text between Project Gutenberg's `*** START OF` and `*** END OF` marker
/// lines, plus the `Title:` header if present. Text without markers is
/// returned whole.
pub(crate) fn strip_gutenberg(raw: &str) -> (Option<String>, &str) {
    let raw = raw.trim_start_matches('\u{feff}');

    let start = raw.find("*** START OF").map(|pos| {
        raw[pos..].find('\n').map(|nl| pos + nl + 1).unwrap_or(raw.len())
    });
    let header = &raw[..start.unwrap_or(raw.len())];
    let title = header
        .lines()
        .find_map(|line| line.trim().strip_prefix("Title:"))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    let body_start = start.unwrap_or(0);
    let body = &raw[body_start..];
    let body = match body.find("*** END OF") {
        Some(end) => &body[..end],
        None => body,
    };

    (title, body.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOOK: &str = "\u{feff}The Project Gutenberg eBook of Alice's Adventures in Wonderland\n\
Title: Alice's Adventures in Wonderland\r\n\
Author: Lewis Carroll\n\
\n\
*** START OF THE PROJECT GUTENBERG EBOOK ALICE'S ADVENTURES IN WONDERLAND ***\n\
CHAPTER I.\n\
Alice was beginning to get very tired.\n\
*** END OF THE PROJECT GUTENBERG EBOOK ALICE'S ADVENTURES IN WONDERLAND ***\n\
License text.";

    #[test]
    fn test_strip_gutenberg_boilerplate() {
        let (title, body) = strip_gutenberg(BOOK);
        assert_eq!(title.as_deref(), Some("Alice's Adventures in Wonderland"));
        assert_eq!(body, "CHAPTER I.\nAlice was beginning to get very tired.");
    }

    #[test]
    fn test_plain_text_passes_through() {
        let (title, body) = strip_gutenberg("  Cats sleep. Dogs run.\n");
        assert!(title.is_none());
        assert_eq!(body, "Cats sleep. Dogs run.");
    }

    #[test]
    fn test_detect_source() {
        let timeout = Duration::from_secs(5);
        assert_eq!(detect_source("11", timeout).unwrap().source_type(), SourceType::Gutenberg);
        assert_eq!(
            detect_source("https://example.com/alice.txt", timeout).unwrap().source_type(),
            SourceType::Http
        );
        assert_eq!(detect_source("./books/alice.txt", timeout).unwrap().source_type(), SourceType::File);
        assert_eq!(detect_source("ftp://example.com/a.txt", timeout).unwrap().source_type(), SourceType::File);
    }

    #[test]
    fn test_detect_remote_source_refuses_paths() {
        let timeout = Duration::from_secs(5);
        assert_eq!(detect_remote_source("84", timeout).unwrap().source_type(), SourceType::Gutenberg);
        assert_eq!(
            detect_remote_source("http://example.com/a.txt", timeout).unwrap().source_type(),
            SourceType::Http
        );
        for input in ["/etc/passwd", "../secrets.txt", "file:///etc/passwd"] {
            assert!(matches!(
                detect_remote_source(input, timeout),
                Err(LeseError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn test_inline_document_id() {
        let doc = Document::inline("Through the Looking-Glass!", "text");
        assert_eq!(doc.id, "inline_through_the_looking_glass");
        assert_eq!(doc.source_type, SourceType::Inline);
    }
}
