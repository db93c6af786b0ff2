//! Chapter detection strategies.

use regex::Regex;
use std::sync::LazyLock;

/// Heading lines such as `CHAPTER I.`, `Chapter 12: The Trial` or `chapter xiv`.
static CHAPTER_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*chapter[ \t]+(?:[0-9]+|[ivxlcdm]+)\b[^\r\n]*$")
        .expect("chapter heading pattern is valid")
});

/// Start of a chapter within a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterMark {
    /// Byte offset where the chapter starts.
    pub offset: usize,
    /// Chapter label.
    pub title: String,
}

/// Strategy that finds chapter boundaries in a document.
pub trait ChapterDetector: Send + Sync {
    /// Chapter starts in ascending offset order.
    fn detect(&self, text: &str) -> Vec<ChapterMark>;

    /// Label for text that precedes the first detected chapter.
    fn fallback_label(&self) -> &str;
}

/// Assigns one label to the whole document.
#[derive(Debug, Clone)]
pub struct FixedChapter {
    label: String,
}

impl FixedChapter {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
        }
    }
}

impl Default for FixedChapter {
    fn default() -> Self {
        Self::new("Chapter 1")
    }
}

impl ChapterDetector for FixedChapter {
    fn detect(&self, _text: &str) -> Vec<ChapterMark> {
        Vec::new()
    }

    fn fallback_label(&self) -> &str {
        &self.label
    }
}

/// Detects `CHAPTER <number>` heading lines, as found in Project Gutenberg texts.
#[derive(Debug, Clone)]
pub struct HeadingChapterDetector {
    fallback: String,
}

impl HeadingChapterDetector {
    pub fn new(fallback: &str) -> Self {
        Self {
            fallback: fallback.to_string(),
        }
    }
}

impl Default for HeadingChapterDetector {
    fn default() -> Self {
        Self::new("Chapter 1")
    }
}

impl ChapterDetector for HeadingChapterDetector {
    fn detect(&self, text: &str) -> Vec<ChapterMark> {
        CHAPTER_HEADING
            .find_iter(text)
            .map(|m| ChapterMark {
                offset: m.start(),
                title: heading_label(m.as_str()),
            })
            .collect()
    }

    fn fallback_label(&self) -> &str {
        &self.fallback
    }
}

/// Normalize a heading line into a label: trimmed, single-spaced, no trailing punctuation.
fn heading_label(line: &str) -> String {
    line.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(['.', ':', '-'])
        .to_string()
}
