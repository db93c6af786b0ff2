//! Plain HTTP(S) text source.

use super::{DocumentSource, Document, SourceType};
use crate::error::{LeseError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Fetches UTF-8 text over HTTP(S).
#[derive(Clone)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("lese/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// GET a URL and return the body. Non-2xx responses are errors.
    #[instrument(skip(self))]
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LeseError::Source(format!("Failed to fetch {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LeseError::Source(format!("Failed to fetch {}: HTTP {}", url, status)));
        }

        let text = response
            .text()
            .await
            .map_err(|e| LeseError::Source(format!("Failed to read body of {}: {}", url, e)))?;

        debug!("Fetched {} bytes from {}", text.len(), url);
        Ok(text)
    }
}

fn parse_http_url(input: &str) -> Option<Url> {
    Url::parse(input)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
}

/// Title from the last non-empty path segment, else the host.
fn title_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(|s| s.to_string())
        .or_else(|| url.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| url.to_string())
}

#[async_trait]
impl DocumentSource for HttpSource {
    fn source_type(&self) -> SourceType {
        SourceType::Http
    }

    async fn fetch(&self, identifier: &str) -> Result<Document> {
        let url = parse_http_url(identifier)
            .ok_or_else(|| LeseError::InvalidInput(format!("Not an http(s) URL: {}", identifier)))?;

        let raw = self.fetch_text(url.as_str()).await?;
        let (title, body) = super::strip_gutenberg(&raw);

        Ok(Document {
            id: url.to_string(),
            title: title.unwrap_or_else(|| title_from_url(&url)),
            text: body.to_string(),
            source: url.to_string(),
            source_type: SourceType::Http,
        })
    }

    fn can_handle(&self, input: &str) -> bool {
        parse_http_url(input).is_some()
    }
}
