//! Error types for Lese.

use thiserror::Error;

/// Library-level error type for Lese operations.
#[derive(Error, Debug)]
pub enum LeseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Document source error: {0}")]
    Source(String),

    /// An embedding or generation backend failed.
    ///
    /// `transient` marks failures worth retrying (network hiccups, rate limits,
    /// server errors). Everything else is permanent.
    #[error("Provider error ({provider}): {message}")]
    Provider {
        provider: String,
        message: String,
        transient: bool,
    },

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Collection '{0}' has no visible records")]
    EmptyCollection(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl LeseError {
    /// A failure the provider may succeed on if asked again.
    pub fn transient(provider: &str, message: impl Into<String>) -> Self {
        LeseError::Provider {
            provider: provider.to_string(),
            message: message.into(),
            transient: true,
        }
    }

    /// A failure that will not go away by retrying (auth, malformed input or response).
    pub fn permanent(provider: &str, message: impl Into<String>) -> Self {
        LeseError::Provider {
            provider: provider.to_string(),
            message: message.into(),
            transient: false,
        }
    }

    /// Whether the retry layer should try the call again.
    pub fn is_transient(&self) -> bool {
        matches!(self, LeseError::Provider { transient: true, .. })
    }
}

/// Result type alias for Lese operations.
pub type Result<T> = std::result::Result<T, LeseError>;
