//! Vector store abstraction for Lese.
//!
//! Provides a trait-based interface for different vector database backends.
//! Records are grouped into named collections with a fixed dimension and
//! similarity metric. Inserted records stay pending until the collection is
//! flushed; only flushed records are visible to search.

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::chunking::Chunk;
use crate::config::{Settings, StoreKind};
use crate::error::{LeseError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// How query and record vectors are compared.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMetric {
    /// Cosine similarity, in [-1, 1].
    #[default]
    Cosine,
    /// Raw dot product.
    Dot,
}

impl SimilarityMetric {
    /// Score `b` against `a`. Higher is more similar.
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            SimilarityMetric::Cosine => cosine_similarity(a, b),
            SimilarityMetric::Dot => dot_product(a, b),
        }
    }
}

impl std::str::FromStr for SimilarityMetric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(SimilarityMetric::Cosine),
            "dot" => Ok(SimilarityMetric::Dot),
            _ => Err(format!("Unknown similarity metric: {}", s)),
        }
    }
}

impl std::fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimilarityMetric::Cosine => write!(f, "cosine"),
            SimilarityMetric::Dot => write!(f, "dot"),
        }
    }
}

/// A chunk paired with its embedding vector.
///
/// Built once per chunk and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    id: Uuid,
    chunk: Chunk,
    embedding: Vec<f32>,
    indexed_at: DateTime<Utc>,
}

impl EmbeddedChunk {
    /// Create a new record with a fresh ID.
    pub fn new(chunk: Chunk, embedding: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            chunk,
            embedding,
            indexed_at: Utc::now(),
        }
    }

    /// Rebuild a record read back from storage.
    pub(crate) fn from_parts(
        id: Uuid,
        chunk: Chunk,
        embedding: Vec<f32>,
        indexed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            chunk,
            embedding,
            indexed_at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }

    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    pub fn indexed_at(&self) -> DateTime<Utc> {
        self.indexed_at
    }

    /// Chunk text.
    pub fn text(&self) -> &str {
        &self.chunk.text
    }

    /// Human-readable location, e.g. "Chapter 1, page 3".
    pub fn location(&self) -> String {
        format!("{}, page {}", self.chunk.chapter, self.chunk.page)
    }
}

/// A search result with score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// The matched record.
    pub chunk: EmbeddedChunk,
    /// Similarity score (higher is better).
    pub score: f32,
}

/// Summary information about a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    /// Vector dimension every record must have.
    pub dimension: usize,
    pub metric: SimilarityMetric,
    /// Records visible to search.
    pub visible: usize,
    /// Records inserted but not yet flushed.
    pub pending: usize,
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a collection, or confirm an existing one has the same schema.
    async fn create_collection(
        &self,
        name: &str,
        dimension: usize,
        metric: SimilarityMetric,
    ) -> Result<CollectionInfo>;

    /// Remove a collection and all its records.
    async fn drop_collection(&self, name: &str) -> Result<()>;

    /// Append records as pending. All-or-nothing.
    async fn insert(&self, collection: &str, records: &[EmbeddedChunk]) -> Result<usize>;

    /// Make every pending record visible. Returns the visible count.
    async fn flush(&self, collection: &str) -> Result<usize>;

    /// Return up to `top_k` visible records most similar to `query`.
    async fn search(&self, collection: &str, query: &[f32], top_k: usize)
        -> Result<Vec<SearchResult>>;

    /// Get a collection's schema and record counts.
    async fn describe(&self, collection: &str) -> Result<CollectionInfo>;

    /// List all collections.
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>>;
}

/// Create the vector store named in settings.
pub fn create_vector_store(settings: &Settings) -> Result<Arc<dyn VectorStore>> {
    match settings.vector_store.provider {
        StoreKind::Sqlite => Ok(Arc::new(SqliteVectorStore::new(&settings.sqlite_path())?)),
        StoreKind::Memory => Ok(Arc::new(MemoryVectorStore::new())),
    }
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Compute the dot product of two vectors.
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Reject the batch if any vector has the wrong length.
pub(crate) fn check_dimensions(expected: usize, records: &[EmbeddedChunk]) -> Result<()> {
    match records.iter().find(|r| r.embedding.len() != expected) {
        Some(bad) => Err(LeseError::DimensionMismatch {
            expected,
            actual: bad.embedding.len(),
        }),
        None => Ok(()),
    }
}

/// Validate a search request against a collection.
pub(crate) fn check_query(info: &CollectionInfo, query: &[f32], top_k: usize) -> Result<()> {
    if top_k == 0 {
        return Err(LeseError::InvalidInput("top_k must be greater than zero".to_string()));
    }
    if query.len() != info.dimension {
        return Err(LeseError::DimensionMismatch {
            expected: info.dimension,
            actual: query.len(),
        });
    }
    if info.visible == 0 {
        return Err(LeseError::EmptyCollection(info.name.clone()));
    }
    Ok(())
}

/// Score records (given in insertion order) and keep the best `top_k`.
///
/// The sort is stable, so equal scores keep insertion order.
pub(crate) fn rank<'a, I>(metric: SimilarityMetric, query: &[f32], records: I, top_k: usize) -> Vec<SearchResult>
where
    I: IntoIterator<Item = &'a EmbeddedChunk>,
{
    let mut results: Vec<SearchResult> = records
        .into_iter()
        .map(|record| SearchResult {
            score: metric.score(query, &record.embedding),
            chunk: record.clone(),
        })
        .collect();

    results.sort_by(|a, b| sort_key(b.score).total_cmp(&sort_key(a.score)));
    results.truncate(top_k);
    results
}

/// NaN scores sort below every real score.
fn sort_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(text: &str, page: u32, embedding: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk::new(
            Chunk {
                text: text.to_string(),
                chapter: "Chapter 1".to_string(),
                page,
                source_offset: 0,
            },
            embedding,
        )
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);

        assert_eq!(cosine_similarity(&a, &[0.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_dot_metric_uses_magnitude() {
        let metric = SimilarityMetric::Dot;
        assert_eq!(metric.score(&[1.0, 2.0], &[3.0, 4.0]), 11.0);
        assert_eq!("dot".parse::<SimilarityMetric>().unwrap(), SimilarityMetric::Dot);
        assert_eq!(SimilarityMetric::Cosine.to_string(), "cosine");
    }

    #[test]
    fn test_rank_puts_nan_scores_last() {
        let records = vec![
            record("broken", 1, vec![f32::NAN, 0.0]),
            record("low", 2, vec![-1.0, 0.0]),
            record("high", 3, vec![2.0, 0.0]),
        ];

        let results = rank(SimilarityMetric::Dot, &[1.0, 0.0], &records, 3);
        let texts: Vec<&str> = results.iter().map(|r| r.chunk.text()).collect();
        assert_eq!(texts, vec!["high", "low", "broken"]);
        assert!(results[2].score.is_nan());
    }

    #[test]
    fn test_rank_breaks_ties_by_insertion_order() {
        let records = vec![
            record("first", 1, vec![1.0, 0.0]),
            record("second", 2, vec![0.0, 1.0]),
            record("third", 3, vec![1.0, 0.0]),
        ];

        let results = rank(SimilarityMetric::Cosine, &[1.0, 0.0], &records, 2);
        let texts: Vec<&str> = results.iter().map(|r| r.chunk.text()).collect();
        assert_eq!(texts, vec!["first", "third"]);
    }

    #[test]
    fn test_check_dimensions() {
        let records = vec![record("a", 1, vec![1.0, 0.0]), record("b", 2, vec![1.0])];
        match check_dimensions(2, &records) {
            Err(LeseError::DimensionMismatch { expected, actual }) => {
                assert_eq!(expected, 2);
                assert_eq!(actual, 1);
            }
            other => panic!("expected dimension mismatch, got {:?}", other),
        }
        assert!(check_dimensions(2, &records[..1]).is_ok());
    }

    #[test]
    fn test_embedded_chunk_location() {
        let r = record("Dogs run.", 2, vec![0.5]);
        assert_eq!(r.location(), "Chapter 1, page 2");
        assert_eq!(r.text(), "Dogs run.");
    }
}
