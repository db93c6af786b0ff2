//! Configuration settings for Lese.

use crate::error::{LeseError, Result};
use crate::vector_store::SimilarityMetric;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub chunking: ChunkingSettings,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
    pub vector_store: VectorStoreSettings,
    pub retrieval: RetrievalSettings,
    pub network: NetworkSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level used when no `-v` flag is given (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.lese".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Backend behind an embedding or generation provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAI,
    Ollama,
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAI),
            "ollama" => Ok(ProviderKind::Ollama),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::OpenAI => write!(f, "openai"),
            ProviderKind::Ollama => write!(f, "ollama"),
        }
    }
}

/// How chapter labels are assigned to chunks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChapterDetection {
    /// Detect `CHAPTER ...` heading lines.
    #[default]
    Headings,
    /// Label every chunk with `default_chapter`.
    Fixed,
}

/// Text chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Chapter detection strategy.
    pub chapter_detection: ChapterDetection,
    /// Label used when no chapter heading applies.
    pub default_chapter: String,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chapter_detection: ChapterDetection::Headings,
            default_chapter: "Chapter 1".to_string(),
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider (openai, ollama).
    pub provider: ProviderKind,
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: usize,
    /// Maximum texts per backend request.
    pub max_batch_size: usize,
    /// Override for the provider base URL.
    pub base_url: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAI,
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            max_batch_size: 100,
            base_url: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

/// Answer generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Generation provider (openai, ollama).
    pub provider: ProviderKind,
    /// Chat model used to write answers.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Override for the provider base URL.
    pub base_url: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAI,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.1,
            base_url: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

/// Storage backend for collections.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Sqlite,
    Memory,
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreKind::Sqlite => write!(f, "sqlite"),
            StoreKind::Memory => write!(f, "memory"),
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Vector store provider (sqlite, memory).
    pub provider: StoreKind,
    /// Path to SQLite database (for sqlite provider).
    pub sqlite_path: String,
    /// Collection the pipeline reads and writes.
    pub collection: String,
    /// Similarity metric for new collections.
    pub metric: SimilarityMetric,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            provider: StoreKind::Sqlite,
            sqlite_path: "~/.lese/vectors.db".to_string(),
            collection: "book_chunks".to_string(),
            metric: SimilarityMetric::Cosine,
        }
    }
}

/// Retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Number of chunks retrieved per question.
    pub top_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

/// Retry, timeout and concurrency settings for backend calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
    /// Deadline for a single embed or generate call, retries included.
    pub timeout_seconds: u64,
    /// Delay before the first retry, doubled for each following one.
    pub initial_backoff_ms: u64,
    /// Embedding batches in flight during ingestion.
    pub embed_concurrency: usize,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout_seconds: 120,
            initial_backoff_ms: 500,
            embed_concurrency: 4,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            settings.validate()?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(LeseError::Config("chunking.chunk_size must be greater than zero".to_string()));
        }
        if self.retrieval.top_k == 0 {
            return Err(LeseError::Config("retrieval.top_k must be greater than zero".to_string()));
        }
        if self.embedding.dimensions == 0 {
            return Err(LeseError::Config("embedding.dimensions must be greater than zero".to_string()));
        }
        if self.embedding.max_batch_size == 0 {
            return Err(LeseError::Config("embedding.max_batch_size must be greater than zero".to_string()));
        }
        if self.network.timeout_seconds == 0 {
            return Err(LeseError::Config("network.timeout_seconds must be greater than zero".to_string()));
        }
        if !matches!(
            self.general.log_level.to_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            return Err(LeseError::Config(format!(
                "general.log_level must be one of trace, debug, info, warn, error (got '{}')",
                self.general.log_level
            )));
        }
        if self.network.embed_concurrency == 0 {
            return Err(LeseError::Config("network.embed_concurrency must be greater than zero".to_string()));
        }
        if self.vector_store.collection.trim().is_empty() {
            return Err(LeseError::Config("vector_store.collection must not be empty".to_string()));
        }
        Ok(())
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| LeseError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lese")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.vector_store.sqlite_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_surface() {
        let settings = Settings::default();
        assert_eq!(settings.chunking.chunk_size, 1000);
        assert_eq!(settings.retrieval.top_k, 3);
        assert_eq!(settings.embedding.dimensions, 1536);
        assert_eq!(settings.vector_store.metric, SimilarityMetric::Cosine);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [embedding]
            provider = "ollama"
            model = "nomic-embed-text"
            dimensions = 768

            [retrieval]
            top_k = 5
            "#,
        )
        .unwrap();

        assert_eq!(settings.embedding.provider, ProviderKind::Ollama);
        assert_eq!(settings.embedding.dimensions, 768);
        assert_eq!(settings.embedding.max_batch_size, 100);
        assert_eq!(settings.retrieval.top_k, 5);
        assert_eq!(settings.chunking.chunk_size, 1000);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut settings = Settings::default();
        settings.retrieval.top_k = 0;
        assert!(matches!(settings.validate(), Err(LeseError::Config(_))));

        let mut settings = Settings::default();
        settings.chunking.chunk_size = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.network.timeout_seconds = 0;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("network.timeout_seconds"));
    }

    #[test]
    fn test_validate_log_level() {
        let mut settings = Settings::default();
        assert_eq!(settings.general.log_level, "warn");

        settings.general.log_level = "DEBUG".to_string();
        assert!(settings.validate().is_ok());

        settings.general.log_level = "loud".to_string();
        assert!(matches!(settings.validate(), Err(LeseError::Config(_))));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut settings = Settings::default();
        settings.vector_store.collection = "alice".to_string();
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.vector_store.collection, "alice");
    }
}
