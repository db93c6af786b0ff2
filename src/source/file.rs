//! Local file source.

use super::{strip_gutenberg, slug, Document, DocumentSource, SourceType};
use crate::config::Settings;
use crate::error::{LeseError, Result};
use async_trait::async_trait;

/// Reads UTF-8 text files from disk.
pub struct FileSource;

impl FileSource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FileSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentSource for FileSource {
    fn source_type(&self) -> SourceType {
        SourceType::File
    }

    async fn fetch(&self, identifier: &str) -> Result<Document> {
        let path = Settings::expand_path(identifier);
        if !path.is_file() {
            return Err(LeseError::Source(format!("File not found: {}", path.display())));
        }

        let bytes = tokio::fs::read(&path).await?;
        let raw = String::from_utf8(bytes)
            .map_err(|_| LeseError::Source(format!("{} is not valid UTF-8", path.display())))?;

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document")
            .to_string();
        let (title, body) = strip_gutenberg(&raw);

        Ok(Document {
            id: format!("local_{}", slug(&stem)),
            title: title.unwrap_or(stem),
            text: body.to_string(),
            source: path.display().to_string(),
            source_type: SourceType::File,
        })
    }

    fn can_handle(&self, input: &str) -> bool {
        Settings::expand_path(input).is_file()
    }
}
