//! Project Gutenberg source.

use super::{strip_gutenberg, Document, DocumentSource, HttpSource, SourceType};
use crate::error::{LeseError, Result};
use async_trait::async_trait;
use tracing::info;

/// Where plain-text UTF-8 editions are served.
pub const GUTENBERG_BASE_URL: &str = "https://www.gutenberg.org/files";

/// Fetches books by numeric Gutenberg id.
pub struct GutenbergSource {
    http: HttpSource,
    base_url: String,
}

impl GutenbergSource {
    pub fn new(http: HttpSource) -> Self {
        Self::with_base_url(http, GUTENBERG_BASE_URL)
    }

    /// Use a mirror instead of gutenberg.org.
    pub fn with_base_url(http: HttpSource, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// URL of the UTF-8 text edition of a book.
    pub fn book_url(&self, book_id: &str) -> String {
        format!("{}/{}/{}-0.txt", self.base_url, book_id, book_id)
    }
}

fn is_book_id(input: &str) -> bool {
    let input = input.trim();
    !input.is_empty() && input.chars().all(|c| c.is_ascii_digit())
}

#[async_trait]
impl DocumentSource for GutenbergSource {
    fn source_type(&self) -> SourceType {
        SourceType::Gutenberg
    }

    async fn fetch(&self, identifier: &str) -> Result<Document> {
        if !is_book_id(identifier) {
            return Err(LeseError::InvalidInput(format!(
                "Not a Gutenberg book id: {}",
                identifier
            )));
        }
        let book_id = identifier.trim();
        let url = self.book_url(book_id);

        let raw = self.http.fetch_text(&url).await?;
        let (title, body) = strip_gutenberg(&raw);
        let title = title.unwrap_or_else(|| format!("Gutenberg #{}", book_id));

        info!("Downloaded \"{}\" ({} characters)", title, body.chars().count());

        Ok(Document {
            id: format!("gutenberg_{}", book_id),
            title,
            text: body.to_string(),
            source: url,
            source_type: SourceType::Gutenberg,
        })
    }

    fn can_handle(&self, input: &str) -> bool {
        is_book_id(input)
    }
}
