//! CLI command implementations.

mod ask;
mod clear;
mod config;
mod ingest;
mod search;
mod serve;
mod status;

pub use ask::run_ask;
pub use clear::run_clear;
pub use config::run_config;
pub use ingest::run_ingest;
pub use search::run_search;
pub use serve::run_serve;
pub use status::run_status;

use crate::cli::preflight;
use crate::config::Settings;
use crate::pipeline::RagPipeline;

/// Build the pipeline with credentials taken from the environment.
fn build_pipeline(settings: &Settings) -> crate::Result<RagPipeline> {
    RagPipeline::from_settings(
        settings,
        preflight::embedding_credentials(settings),
        preflight::generation_credentials(settings),
    )
}
