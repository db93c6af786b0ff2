//! Text chunking for breaking documents into searchable segments.
//!
//! The [`SentenceChunker`] packs whole sentences into chunks of bounded
//! length. Chapter labels come from a [`ChapterDetector`] strategy so that
//! different document layouts can supply real boundaries without touching the
//! splitting algorithm.

mod chapter;
mod sentence;

pub use chapter::{ChapterDetector, ChapterMark, FixedChapter, HeadingChapterDetector};
pub use sentence::SentenceChunker;

use crate::config::{ChapterDetection, ChunkingSettings};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A bounded segment of a document with positional metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Text content of this chunk.
    pub text: String,
    /// Chapter the chunk belongs to.
    pub chapter: String,
    /// 1-based position of the chunk in the document.
    pub page: u32,
    /// Byte offset of the chunk's first character in the source text.
    pub source_offset: usize,
}

impl Chunk {
    /// Length of the chunk text in characters.
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    /// Whether the chunk text is empty. Chunkers never emit empty chunks.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Trait for text chunking implementations.
///
/// Chunking is CPU-bound and infallible: malformed or empty input produces an
/// empty vector rather than an error.
pub trait Chunker: Send + Sync {
    /// Split `text` into chunks of at most `chunk_size` characters.
    fn chunk(&self, text: &str, chunk_size: usize) -> Vec<Chunk>;
}

/// Create a chunker from the `[chunking]` settings.
pub fn create_chunker(settings: &ChunkingSettings) -> Arc<dyn Chunker> {
    let detector: Arc<dyn ChapterDetector> = match settings.chapter_detection {
        ChapterDetection::Headings => {
            Arc::new(HeadingChapterDetector::new(&settings.default_chapter))
        }
        ChapterDetection::Fixed => Arc::new(FixedChapter::new(&settings.default_chapter)),
    };
    Arc::new(SentenceChunker::with_detector(detector))
}
