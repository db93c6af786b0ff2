//! CLI module for Lese.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Lese - Book ingestion and grounded question answering
///
/// A local-first CLI tool for indexing books and asking questions about them.
/// The name "Lese" comes from the Norwegian word for "read."
#[derive(Parser, Debug)]
#[command(name = "lese")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "LESE_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chunk, embed and index a book
    Ingest {
        /// Gutenberg book number, http(s) URL, or local text file
        source: String,

        /// Maximum chunk length in characters (defaults to the configured size)
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Drop and recreate the collection before indexing
        #[arg(long)]
        clear: bool,
    },

    /// Ask a question and get an answer grounded in the indexed text
    Ask {
        /// The question to ask
        question: String,

        /// Number of chunks to retrieve as context
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Search for the passages most similar to a query
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Show the collection's schema and record counts
    Status,

    /// Drop and recreate the collection
    Clear,

    /// Start HTTP API server for integration with other systems
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Default tracing directive: `-v` flags win over the configured level.
    pub fn log_directive(&self, configured_level: &str) -> String {
        let level = match self.verbose {
            0 => configured_level,
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        format!("lese={}", level.to_lowercase())
    }
}
