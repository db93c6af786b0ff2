//! HTTP API server for integration with other systems.
//!
//! Provides REST endpoints for ingestion, search and grounded questions.

use super::build_pipeline;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::LeseError;
use crate::pipeline::{IngestReport, RagPipeline};
use crate::rag::Conversation;
use crate::source::Document;
use crate::vector_store::SearchResult;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

/// Shared application state.
struct AppState {
    pipeline: RagPipeline,
    chunk_size: usize,
    top_k: usize,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Serve, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let pipeline = build_pipeline(&settings)?;
    let state = Arc::new(AppState {
        pipeline,
        chunk_size: settings.chunking.chunk_size,
        top_k: settings.retrieval.top_k,
    });

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Lese API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::list_item("GET  /health");
    Output::list_item("GET  /status");
    Output::list_item("POST /ingest");
    Output::list_item("POST /search");
    Output::list_item("POST /ask");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, router(state)).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/ingest", post(ingest))
        .route("/search", post(search))
        .route("/ask", post(ask))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct IngestRequest {
    /// Raw text to index.
    #[serde(default)]
    text: Option<String>,
    /// Gutenberg id or http(s) URL to fetch instead. Local paths are refused.
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    chunk_size: Option<usize>,
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SourceInfo>,
}

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default)]
    top_k: Option<usize>,
    #[serde(default)]
    history: Conversation,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    grounded: bool,
    sources: Vec<SourceInfo>,
}

#[derive(Serialize)]
struct SourceInfo {
    chapter: String,
    page: u32,
    score: f32,
    text: String,
}

impl From<SearchResult> for SourceInfo {
    fn from(result: SearchResult) -> Self {
        let chunk = result.chunk.chunk();
        Self {
            chapter: chunk.chapter.clone(),
            page: chunk.page,
            score: result.score,
            text: chunk.text.clone(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// An error carried to the client with a status chosen by kind.
struct ApiError(LeseError);

impl From<LeseError> for ApiError {
    fn from(err: LeseError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            warn!("Request failed: {}", self.0);
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

fn status_for(err: &LeseError) -> StatusCode {
    match err {
        LeseError::InvalidInput(_) | LeseError::Source(_) => StatusCode::BAD_REQUEST,
        LeseError::CollectionNotFound(_) => StatusCode::NOT_FOUND,
        LeseError::EmptyCollection(_) => StatusCode::CONFLICT,
        LeseError::DimensionMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        LeseError::Provider { .. } | LeseError::Http(_) => StatusCode::BAD_GATEWAY,
        LeseError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn status(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.pipeline.status().await?))
}

async fn ingest(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestReport>, ApiError> {
    let chunk_size = req.chunk_size.unwrap_or(state.chunk_size);

    let report = match (req.text, req.source) {
        (Some(text), None) => {
            let title = req.title.as_deref().unwrap_or("Untitled");
            state.pipeline.ingest(&Document::inline(title, text), chunk_size).await?
        }
        (None, Some(source)) => state.pipeline.ingest_remote(&source, chunk_size).await?,
        _ => {
            return Err(LeseError::InvalidInput(
                "provide exactly one of \"text\" or \"source\"".to_string(),
            )
            .into())
        }
    };

    Ok(Json(report))
}

async fn search(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let top_k = req.top_k.unwrap_or(state.top_k);
    let results = state.pipeline.search(&req.query, top_k).await?;

    Ok(Json(SearchResponse {
        results: results.into_iter().map(SourceInfo::from).collect(),
    }))
}

async fn ask(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let top_k = req.top_k.unwrap_or(state.top_k);
    let history = Conversation::from_turns(req.history.turns().to_vec());
    let answer = state
        .pipeline
        .ask_with_history(&req.question, top_k, &history)
        .await?;

    Ok(Json(AskResponse {
        answer: answer.answer,
        grounded: answer.grounded,
        sources: answer.sources.into_iter().map(SourceInfo::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::SentenceChunker;
    use crate::embedding::Embedder;
    use crate::generation::{GenerationRequest, Generator};
    use crate::rag::AnswerSynthesizer;
    use crate::vector_store::MemoryVectorStore;
    use async_trait::async_trait;

    /// Counts animal words: one dimension each for cats, dogs and birds.
    struct AnimalEmbedder;

    #[async_trait]
    impl Embedder for AnimalEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    vec![
                        t.matches("cat").count() as f32,
                        t.matches("dog").count() as f32,
                        t.matches("bird").count() as f32,
                    ]
                })
                .collect())
        }

        fn dimensions(&self) -> usize {
            3
        }

        fn max_batch_size(&self) -> usize {
            8
        }

        fn name(&self) -> &str {
            "animals"
        }
    }

    /// Answers with the last line of the prompt's first context entry.
    struct FirstSource;

    #[async_trait]
    impl Generator for FirstSource {
        async fn generate(&self, request: &GenerationRequest) -> crate::Result<String> {
            let prompt = &request.messages[request.messages.len() - 1].content;
            let start = prompt.find("[1]").unwrap_or(0);
            Ok(prompt[start..].lines().nth(1).unwrap_or("").to_string())
        }

        fn model(&self) -> &str {
            "first-source"
        }

        fn name(&self) -> &str {
            "first-source"
        }
    }

    async fn spawn_server() -> String {
        let mut settings = Settings::default();
        settings.chunking.chunk_size = 12;
        settings.retrieval.top_k = 1;

        let pipeline = RagPipeline::with_components(
            &settings,
            Arc::new(SentenceChunker::new()),
            Arc::new(AnimalEmbedder),
            Arc::new(MemoryVectorStore::new()),
            AnswerSynthesizer::new(Arc::new(FirstSource)),
        );
        let state = Arc::new(AppState {
            pipeline,
            chunk_size: settings.chunking.chunk_size,
            top_k: settings.retrieval.top_k,
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_ingest_then_ask() {
        let base = spawn_server().await;
        let client = reqwest::Client::new();

        let report: serde_json::Value = client
            .post(format!("{}/ingest", base))
            .json(&serde_json::json!({ "text": "Cats sleep. Dogs run. Birds fly.", "title": "Animals" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(report["chunks"], 3);
        assert_eq!(report["visible"], 3);

        let answer: serde_json::Value = client
            .post(format!("{}/ask", base))
            .json(&serde_json::json!({ "question": "What do dogs do?" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(answer["answer"], "Dogs run.");
        assert_eq!(answer["grounded"], true);
        assert_eq!(answer["sources"].as_array().unwrap().len(), 1);
        assert_eq!(answer["sources"][0]["text"], "Dogs run.");
    }

    #[tokio::test]
    async fn test_error_status_codes() {
        let base = spawn_server().await;
        let client = reqwest::Client::new();

        let missing = client
            .get(format!("{}/status", base))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status().as_u16(), 404);

        let both = client
            .post(format!("{}/ingest", base))
            .json(&serde_json::json!({ "text": "Cats sleep.", "source": "11" }))
            .send()
            .await
            .unwrap();
        assert_eq!(both.status().as_u16(), 400);

        let local_path = client
            .post(format!("{}/ingest", base))
            .json(&serde_json::json!({ "source": "/etc/passwd" }))
            .send()
            .await
            .unwrap();
        assert_eq!(local_path.status().as_u16(), 400);
        let body: serde_json::Value = local_path.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("/etc/passwd"));

        let zero_k = client
            .post(format!("{}/search", base))
            .json(&serde_json::json!({ "query": "cats", "top_k": 0 }))
            .send()
            .await
            .unwrap();
        assert_eq!(zero_k.status().as_u16(), 400);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&LeseError::EmptyCollection("books".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&LeseError::DimensionMismatch { expected: 3, actual: 2 }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&LeseError::transient("openai", "503")),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&LeseError::Timeout {
                operation: "generate".to_string(),
                seconds: 120
            }),
            StatusCode::GATEWAY_TIMEOUT
        );
    }
}
