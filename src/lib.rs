//! Lese - Book ingestion and grounded question answering
//!
//! A local-first CLI tool for indexing books and asking questions about them.
//!
//! The name "Lese" comes from the Norwegian word for "read."
//!
//! # Overview
//!
//! Lese allows you to:
//! - Fetch books from Project Gutenberg, any URL, or local text files
//! - Split them into sentence-aligned chunks labelled with chapter and page
//! - Embed and index the chunks in a vector store
//! - Ask questions and get answers written only from the retrieved passages
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `source` - Document sources (Gutenberg, HTTP, local files)
//! - `chunking` - Sentence chunking and chapter detection
//! - `embedding` - Embedding generation with retries
//! - `generation` - Chat completion backends
//! - `vector_store` - Collections with a flush visibility boundary
//! - `rag` - Grounded answer synthesis
//! - `pipeline` - Pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use lese::config::{ProviderCredentials, Settings};
//! use lese::pipeline::RagPipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let creds = ProviderCredentials::from_env("OPENAI_API_KEY", None);
//!     let pipeline = RagPipeline::from_settings(&settings, creds.clone(), creds)?;
//!
//!     // Index Alice's Adventures in Wonderland
//!     let report = pipeline.ingest_identifier("11", settings.chunking.chunk_size).await?;
//!     println!("Indexed {} chunks", report.chunks);
//!
//!     let answer = pipeline.ask("Why is the Rabbit late?", settings.retrieval.top_k).await?;
//!     println!("{}", answer.format_for_display());
//!
//!     Ok(())
//! }
//! ```

pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod openai;
pub mod pipeline;
pub mod rag;
pub mod retry;
pub mod source;
pub mod vector_store;

pub use error::{LeseError, Result};
