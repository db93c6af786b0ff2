//! Sentence-packing chunker.
//!
//! Splits on sentence-terminal punctuation and greedily packs whole sentences
//! into chunks. A sentence longer than the chunk size is emitted on its own,
//! never truncated.

use super::chapter::{ChapterDetector, FixedChapter};
use super::{Chunk, Chunker};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::debug;

/// A run of terminal punctuation plus any closing quotes or brackets after it.
static SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[.!?]+["'\u{201D}\u{2019})\]]*"#).expect("sentence terminator pattern is valid")
});

/// Chunker that packs whole sentences up to a character budget.
pub struct SentenceChunker {
    chapters: Arc<dyn ChapterDetector>,
}

impl SentenceChunker {
    /// Create a chunker that labels every chunk "Chapter 1".
    pub fn new() -> Self {
        Self::with_detector(Arc::new(FixedChapter::default()))
    }

    /// Create a chunker with a custom chapter detection strategy.
    pub fn with_detector(chapters: Arc<dyn ChapterDetector>) -> Self {
        Self { chapters }
    }

    /// Chunk one chapter section, appending to `chunks`.
    fn chunk_section(
        &self,
        section: &str,
        section_offset: usize,
        chapter: &str,
        chunk_size: usize,
        chunks: &mut Vec<Chunk>,
    ) {
        let mut buffer = String::new();
        let mut buffer_len = 0usize;
        let mut buffer_offset = 0usize;

        for sentence in split_sentences(section) {
            let text = collapse_whitespace(sentence.text);
            let len = text.chars().count();

            if buffer.is_empty() {
                buffer = text;
                buffer_len = len;
                buffer_offset = section_offset + sentence.offset;
                continue;
            }

            if buffer_len + 1 + len > chunk_size {
                push_chunk(chunks, std::mem::take(&mut buffer), chapter, buffer_offset);
                buffer = text;
                buffer_len = len;
                buffer_offset = section_offset + sentence.offset;
            } else {
                buffer.push(' ');
                buffer.push_str(&text);
                buffer_len += 1 + len;
            }
        }

        if !buffer.is_empty() {
            push_chunk(chunks, buffer, chapter, buffer_offset);
        }
    }
}

impl Default for SentenceChunker {
    fn default() -> Self {
        Self::new()
    }
}

impl Chunker for SentenceChunker {
    fn chunk(&self, text: &str, chunk_size: usize) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        if text.trim().is_empty() {
            return chunks;
        }

        let mut marks = self.chapters.detect(text);
        marks.retain(|m| m.offset < text.len() && text.is_char_boundary(m.offset));
        marks.sort_by_key(|m| m.offset);

        // Text before the first heading belongs to the fallback chapter.
        let first_start = marks.first().map(|m| m.offset).unwrap_or(text.len());
        self.chunk_section(
            &text[..first_start],
            0,
            self.chapters.fallback_label(),
            chunk_size,
            &mut chunks,
        );

        for (i, mark) in marks.iter().enumerate() {
            let end = marks.get(i + 1).map(|next| next.offset).unwrap_or(text.len());
            self.chunk_section(&text[mark.offset..end], mark.offset, &mark.title, chunk_size, &mut chunks);
        }

        debug!("Chunked {} bytes into {} chunks", text.len(), chunks.len());
        chunks
    }
}

fn push_chunk(chunks: &mut Vec<Chunk>, text: String, chapter: &str, source_offset: usize) {
    let page = chunks.len() as u32 + 1;
    chunks.push(Chunk {
        text,
        chapter: chapter.to_string(),
        page,
        source_offset,
    });
}

/// A sentence borrowed from the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Sentence<'a> {
    text: &'a str,
    /// Byte offset of the first non-whitespace character.
    offset: usize,
}

/// Split text into trimmed, non-empty sentences.
fn split_sentences(text: &str) -> Vec<Sentence<'_>> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for m in SENTENCE_END.find_iter(text) {
        push_sentence(text, start, m.end(), &mut sentences);
        start = m.end();
    }
    push_sentence(text, start, text.len(), &mut sentences);

    sentences
}

fn push_sentence<'a>(text: &'a str, start: usize, end: usize, out: &mut Vec<Sentence<'a>>) {
    let span = &text[start..end];
    let trimmed = span.trim_start();
    let offset = start + (span.len() - trimmed.len());
    let trimmed = trimmed.trim_end();

    if !trimmed.is_empty() {
        out.push(Sentence {
            text: trimmed,
            offset,
        });
    }
}

/// Collapse line breaks and runs of whitespace into single spaces.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
