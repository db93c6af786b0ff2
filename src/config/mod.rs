//! Configuration module for Lese.
//!
//! Handles loading and managing application settings and prompt templates.

mod credentials;
mod prompts;
mod settings;

pub use credentials::ProviderCredentials;
pub use prompts::{Prompts, RagPrompts};
pub use settings::{
    ChapterDetection, ChunkingSettings, EmbeddingSettings, GeneralSettings, GenerationSettings,
    NetworkSettings, PromptSettings, ProviderKind, RetrievalSettings, Settings, StoreKind,
    VectorStoreSettings,
};
