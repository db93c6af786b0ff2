//! Pipeline orchestrator for Lese.
//!
//! Coordinates chunking, embedding, indexing, retrieval and answer synthesis.
//! The pipeline holds no state between requests: every collection lives in
//! the vector store and every conversation belongs to the caller.

use crate::chunking::{create_chunker, Chunker};
use crate::config::{Prompts, ProviderCredentials, Settings};
use crate::embedding::{create_embedder, Embedder};
use crate::error::{LeseError, Result};
use crate::generation::create_generator;
use crate::rag::{Answer, AnswerSynthesizer, Conversation};
use crate::source::{detect_remote_source, detect_source, Document, DocumentSource};
use crate::vector_store::{
    create_vector_store, CollectionInfo, EmbeddedChunk, SearchResult, SimilarityMetric, VectorStore,
};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Outcome of ingesting one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub document_id: String,
    pub title: String,
    pub collection: String,
    /// Chunks embedded and inserted for this document.
    pub chunks: usize,
    /// Visible records in the collection after the flush.
    pub visible: usize,
}

/// The main orchestrator for the Lese pipeline.
pub struct RagPipeline {
    chunker: Arc<dyn Chunker>,
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<dyn VectorStore>,
    synthesizer: AnswerSynthesizer,
    collection: String,
    metric: SimilarityMetric,
    embed_concurrency: usize,
    fetch_timeout: Duration,
}

impl RagPipeline {
    /// Build every component from settings.
    pub fn from_settings(
        settings: &Settings,
        embedding_credentials: ProviderCredentials,
        generation_credentials: ProviderCredentials,
    ) -> Result<Self> {
        // Load prompts (with optional custom directory and variables)
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let embedder = create_embedder(&settings.embedding, &settings.network, embedding_credentials)?;
        let generator =
            create_generator(&settings.generation, &settings.network, generation_credentials)?;
        let vector_store = create_vector_store(settings)?;

        info!(
            "Using {} embeddings ({}) and {} generation ({})",
            settings.embedding.provider,
            settings.embedding.model,
            settings.generation.provider,
            settings.generation.model
        );

        Ok(Self::with_components(
            settings,
            create_chunker(&settings.chunking),
            embedder,
            vector_store,
            AnswerSynthesizer::new(generator).with_prompts(prompts),
        ))
    }

    /// Create a pipeline with custom components.
    pub fn with_components(
        settings: &Settings,
        chunker: Arc<dyn Chunker>,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
        synthesizer: AnswerSynthesizer,
    ) -> Self {
        Self {
            chunker,
            embedder,
            vector_store,
            synthesizer,
            collection: settings.vector_store.collection.clone(),
            metric: settings.vector_store.metric,
            embed_concurrency: settings.network.embed_concurrency.max(1),
            fetch_timeout: Duration::from_secs(settings.network.timeout_seconds),
        }
    }

    /// Get a reference to the vector store.
    pub fn vector_store(&self) -> Arc<dyn VectorStore> {
        self.vector_store.clone()
    }

    /// Get a reference to the embedder.
    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    /// Name of the collection this pipeline reads and writes.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Create the collection, or check an existing one fits the embedder.
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn ensure_collection(&self) -> Result<CollectionInfo> {
        let dimension = self.embedder.dimensions();

        match self.vector_store.describe(&self.collection).await {
            Ok(info) if info.dimension != dimension => Err(LeseError::DimensionMismatch {
                expected: info.dimension,
                actual: dimension,
            }),
            Ok(_) | Err(LeseError::CollectionNotFound(_)) => {
                self.vector_store
                    .create_collection(&self.collection, dimension, self.metric)
                    .await
            }
            Err(e) => Err(e),
        }
    }

    /// Collection schema and counts.
    pub async fn status(&self) -> Result<CollectionInfo> {
        self.vector_store.describe(&self.collection).await
    }

    /// Chunk, embed, insert and flush one document.
    ///
    /// Every embedding is computed before anything is inserted, so a failed
    /// or timed-out embed leaves the collection unchanged.
    #[instrument(skip(self, document), fields(document = %document.id))]
    pub async fn ingest(&self, document: &Document, chunk_size: usize) -> Result<IngestReport> {
        if chunk_size == 0 {
            return Err(LeseError::InvalidInput("chunk_size must be greater than zero".to_string()));
        }

        self.ensure_collection().await?;

        let chunks = self.chunker.chunk(&document.text, chunk_size);
        info!("Chunked \"{}\" into {} chunks", document.title, chunks.len());

        if chunks.is_empty() {
            warn!("Document \"{}\" produced no chunks", document.title);
            let info = self.status().await?;
            return Ok(self.report(document, 0, info.visible));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embed_all(&texts).await?;

        let records: Vec<EmbeddedChunk> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| EmbeddedChunk::new(chunk, embedding))
            .collect();

        let inserted = self.vector_store.insert(&self.collection, &records).await?;
        let visible = self.vector_store.flush(&self.collection).await?;

        info!("Indexed {} chunks ({} visible in {})", inserted, visible, self.collection);
        Ok(self.report(document, inserted, visible))
    }

    /// Fetch a document from a source, then ingest it.
    pub async fn ingest_from(
        &self,
        source: &dyn DocumentSource,
        identifier: &str,
        chunk_size: usize,
    ) -> Result<IngestReport> {
        info!("Fetching {} from {} source", identifier, source.source_type());
        let document = source.fetch(identifier).await?;
        self.ingest(&document, chunk_size).await
    }

    /// Ingest a Gutenberg id, URL or file path, picking the source automatically.
    pub async fn ingest_identifier(&self, identifier: &str, chunk_size: usize) -> Result<IngestReport> {
        let source = detect_source(identifier, self.fetch_timeout)?;
        self.ingest_from(source.as_ref(), identifier, chunk_size).await
    }

    /// Like [`Self::ingest_identifier`], but only Gutenberg ids and http(s) URLs are accepted.
    pub async fn ingest_remote(&self, identifier: &str, chunk_size: usize) -> Result<IngestReport> {
        let source = detect_remote_source(identifier, self.fetch_timeout)?;
        self.ingest_from(source.as_ref(), identifier, chunk_size).await
    }

    /// Embed texts in batches with bounded concurrency, preserving order.
    async fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batch_size = self.embedder.max_batch_size().max(1);
        let batch_count = texts.len().div_ceil(batch_size);
        debug!(
            "Embedding {} texts in {} batches ({} in flight)",
            texts.len(),
            batch_count,
            self.embed_concurrency
        );

        // Owned batches keep the ingest future Send for spawned tasks and handlers.
        let batches: Vec<(usize, Vec<String>)> = texts
            .chunks(batch_size)
            .map(<[String]>::to_vec)
            .enumerate()
            .collect();

        let mut stream = stream::iter(batches)
            .map(|(idx, batch)| {
                let embedder = Arc::clone(&self.embedder);
                async move { (idx, embedder.embed_batch(&batch).await) }
            })
            .buffer_unordered(self.embed_concurrency);

        let mut results = Vec::with_capacity(batch_count);
        while let Some((idx, result)) = stream.next().await {
            match result {
                Ok(vectors) => results.push((idx, vectors)),
                Err(e) => {
                    warn!("Embedding batch {} of {} failed: {}", idx + 1, batch_count, e);
                    return Err(e);
                }
            }
        }

        results.sort_by_key(|(idx, _)| *idx);
        let embeddings: Vec<Vec<f32>> = results.into_iter().flat_map(|(_, v)| v).collect();

        if embeddings.len() != texts.len() {
            return Err(LeseError::permanent(
                self.embedder.name(),
                format!("Expected {} embeddings, got {}", texts.len(), embeddings.len()),
            ));
        }
        Ok(embeddings)
    }

    /// Retrieve the `top_k` chunks most similar to `question`.
    #[instrument(skip(self))]
    pub async fn search(&self, question: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        if question.trim().is_empty() {
            return Err(LeseError::InvalidInput("question must not be empty".to_string()));
        }
        if top_k == 0 {
            return Err(LeseError::InvalidInput("top_k must be greater than zero".to_string()));
        }

        let query = self.embedder.embed(question).await?;
        self.vector_store.search(&self.collection, &query, top_k).await
    }

    /// Answer a question from the indexed text.
    pub async fn ask(&self, question: &str, top_k: usize) -> Result<Answer> {
        self.ask_with_history(question, top_k, &Conversation::new()).await
    }

    /// Answer a question with earlier turns as extra context.
    #[instrument(skip(self, history), fields(history = history.len()))]
    pub async fn ask_with_history(
        &self,
        question: &str,
        top_k: usize,
        history: &Conversation,
    ) -> Result<Answer> {
        let results = self.search(question, top_k).await?;
        let synthesis = self
            .synthesizer
            .synthesize_with_history(question, &results, history.turns())
            .await?;

        Ok(Answer::new(question, synthesis, results))
    }

    /// Drop and recreate the collection.
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn clear(&self) -> Result<CollectionInfo> {
        match self.vector_store.drop_collection(&self.collection).await {
            Ok(()) | Err(LeseError::CollectionNotFound(_)) => {}
            Err(e) => return Err(e),
        }
        info!("Cleared collection {}", self.collection);
        self.ensure_collection().await
    }

    fn report(&self, document: &Document, chunks: usize, visible: usize) -> IngestReport {
        IngestReport {
            document_id: document.id.clone(),
            title: document.title.clone(),
            collection: self.collection.clone(),
            chunks,
            visible,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::SentenceChunker;
    use crate::generation::{GenerationRequest, Generator};
    use crate::vector_store::MemoryVectorStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// One dimension per text position; batches finish in reverse order.
    struct SlowFirstEmbedder {
        batch_size: usize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        fail_on: Option<String>,
    }

    impl SlowFirstEmbedder {
        fn new(batch_size: usize) -> Self {
            Self {
                batch_size,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                fail_on: None,
            }
        }
    }

    #[async_trait]
    impl Embedder for SlowFirstEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            // Later batches sleep less, so they finish first.
            let first: f32 = texts[0].trim_end_matches('.').parse().unwrap_or(0.0);
            tokio::time::sleep(Duration::from_millis(100 - first as u64)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if let Some(bad) = &self.fail_on {
                if texts.contains(bad) {
                    return Err(LeseError::permanent("slow", "rejected input"));
                }
            }
            Ok(texts
                .iter()
                .map(|t| vec![t.trim_end_matches('.').parse().unwrap_or(0.0), 1.0])
                .collect())
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn max_batch_size(&self) -> usize {
            self.batch_size
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    struct Echo;

    #[async_trait]
    impl Generator for Echo {
        async fn generate(&self, request: &GenerationRequest) -> Result<String> {
            Ok(format!("{} messages", request.messages.len()))
        }

        fn model(&self) -> &str {
            "echo"
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    fn pipeline(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> RagPipeline {
        let mut settings = Settings::default();
        settings.vector_store.collection = "test".to_string();
        settings.network.embed_concurrency = 3;
        RagPipeline::with_components(
            &settings,
            Arc::new(SentenceChunker::new()),
            embedder,
            store,
            AnswerSynthesizer::new(Arc::new(Echo)),
        )
    }

    fn numbered(count: usize) -> Document {
        let text = (1..=count).map(|i| format!("{}.", i)).collect::<Vec<_>>().join(" ");
        Document::inline("numbers", text)
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_batches_are_reassembled_in_order() {
        let embedder = Arc::new(SlowFirstEmbedder::new(2));
        let store = Arc::new(MemoryVectorStore::new());
        let pipeline = pipeline(embedder.clone(), store.clone());

        // chunk_size 1 puts every sentence in its own chunk.
        let report = pipeline.ingest(&numbered(9), 1).await.unwrap();
        assert_eq!(report.chunks, 9);
        assert_eq!(report.visible, 9);
        assert!(embedder.max_in_flight.load(Ordering::SeqCst) <= 3);
        assert!(embedder.max_in_flight.load(Ordering::SeqCst) > 1);

        let results = store.search("test", &[5.0, 1.0], 9).await.unwrap();
        for result in &results {
            let expected: f32 = result.chunk.text().trim_end_matches('.').parse().unwrap();
            assert_eq!(result.chunk.embedding()[0], expected);
            assert_eq!(result.chunk.chunk().page as f32, expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_batch_leaves_collection_untouched() {
        let mut embedder = SlowFirstEmbedder::new(2);
        embedder.fail_on = Some("7.".to_string());
        let store = Arc::new(MemoryVectorStore::new());
        let pipeline = pipeline(Arc::new(embedder), store.clone());

        let result = pipeline.ingest(&numbered(9), 1).await;
        assert!(matches!(result, Err(LeseError::Provider { .. })));

        let info = store.describe("test").await.unwrap();
        assert_eq!((info.visible, info.pending), (0, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reingest_duplicates_and_clear_resets() {
        let store = Arc::new(MemoryVectorStore::new());
        let pipeline = pipeline(Arc::new(SlowFirstEmbedder::new(4)), store);

        pipeline.ingest(&numbered(3), 1).await.unwrap();
        let report = pipeline.ingest(&numbered(3), 1).await.unwrap();
        assert_eq!(report.visible, 6);

        let info = pipeline.clear().await.unwrap();
        assert_eq!((info.visible, info.dimension), (0, 2));
        assert!(matches!(pipeline.ask("1.", 1).await, Err(LeseError::EmptyCollection(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ingests_run_on_spawned_tasks() {
        let store = Arc::new(MemoryVectorStore::new());
        let pipeline = Arc::new(pipeline(Arc::new(SlowFirstEmbedder::new(2)), store));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let pipeline = Arc::clone(&pipeline);
                tokio::spawn(async move { pipeline.ingest(&numbered(5), 1).await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().chunks, 5);
        }

        let info = pipeline.status().await.unwrap();
        assert_eq!((info.visible, info.pending), (10, 0));
    }

    #[tokio::test]
    async fn test_ensure_collection_rejects_other_dimension() {
        let store = Arc::new(MemoryVectorStore::new());
        store.create_collection("test", 5, SimilarityMetric::Cosine).await.unwrap();
        let pipeline = pipeline(Arc::new(SlowFirstEmbedder::new(4)), store);

        assert!(matches!(
            pipeline.ensure_collection().await,
            Err(LeseError::DimensionMismatch { expected: 5, actual: 2 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ask_returns_sources_used() {
        let pipeline = pipeline(Arc::new(SlowFirstEmbedder::new(4)), Arc::new(MemoryVectorStore::new()));
        pipeline.ingest(&numbered(4), 1).await.unwrap();

        let mut history = Conversation::new();
        let first = pipeline.ask_with_history("3.", 2, &history).await.unwrap();
        assert!(first.grounded);
        assert_eq!(first.sources.len(), 2);
        assert_eq!(first.answer, "2 messages");

        history.record("3.", &first);
        let second = pipeline.ask_with_history("4.", 2, &history).await.unwrap();
        assert_eq!(second.answer, "4 messages");
    }

    #[tokio::test]
    async fn test_invalid_requests() {
        let pipeline = pipeline(Arc::new(SlowFirstEmbedder::new(4)), Arc::new(MemoryVectorStore::new()));
        assert!(matches!(pipeline.search("  ", 3).await, Err(LeseError::InvalidInput(_))));
        assert!(matches!(pipeline.search("dogs", 0).await, Err(LeseError::InvalidInput(_))));
        assert!(matches!(
            pipeline.ingest(&numbered(2), 0).await,
            Err(LeseError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_document_indexes_nothing() {
        let pipeline = pipeline(Arc::new(SlowFirstEmbedder::new(4)), Arc::new(MemoryVectorStore::new()));
        let report = pipeline.ingest(&Document::inline("blank", "   \n "), 100).await.unwrap();
        assert_eq!((report.chunks, report.visible), (0, 0));
    }
}
