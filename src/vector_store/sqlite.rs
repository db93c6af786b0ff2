//! SQLite-based vector store implementation.
//!
//! Uses SQLite with similarity computed in Rust for simplicity.
//! Records carry a `visible` flag that `flush` sets; the autoincrement `seq`
//! column preserves insertion order for tie-breaking.

use super::{
    check_dimensions, check_query, rank, CollectionInfo, EmbeddedChunk, SearchResult,
    SimilarityMetric, VectorStore,
};
use crate::chunking::Chunk;
use crate::error::{LeseError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS collections (
        name TEXT PRIMARY KEY,
        dimension INTEGER NOT NULL,
        metric TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS records (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        collection TEXT NOT NULL REFERENCES collections(name) ON DELETE CASCADE,
        text TEXT NOT NULL,
        chapter TEXT NOT NULL,
        page INTEGER NOT NULL,
        source_offset INTEGER NOT NULL,
        embedding BLOB NOT NULL,
        indexed_at TEXT NOT NULL,
        visible INTEGER NOT NULL DEFAULT 0
    );

    CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection, visible);
"#;

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Create a new SQLite vector store.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(&conn)?;

        info!("Initialized SQLite vector store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite vector store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init(conn: &Connection) -> Result<()> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| LeseError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    /// Load a collection's schema and counts, if it exists.
    fn collection_info(conn: &Connection, name: &str) -> Result<Option<CollectionInfo>> {
        let row = conn
            .query_row(
                r#"
                SELECT c.dimension, c.metric,
                       COALESCE(SUM(r.visible = 1), 0),
                       COALESCE(SUM(r.visible = 0), 0)
                FROM collections c
                LEFT JOIN records r ON r.collection = c.name
                WHERE c.name = ?1
                GROUP BY c.name
                "#,
                params![name],
                |row| {
                    let dimension: i64 = row.get(0)?;
                    let metric: String = row.get(1)?;
                    let visible: i64 = row.get(2)?;
                    let pending: i64 = row.get(3)?;
                    Ok((dimension, metric, visible, pending))
                },
            )
            .optional()?;

        row.map(|(dimension, metric, visible, pending)| {
            let metric: SimilarityMetric = metric.parse().map_err(LeseError::VectorStore)?;
            Ok(CollectionInfo {
                name: name.to_string(),
                dimension: dimension as usize,
                metric,
                visible: visible as usize,
                pending: pending as usize,
            })
        })
        .transpose()
    }

    fn require_collection(conn: &Connection, name: &str) -> Result<CollectionInfo> {
        Self::collection_info(conn, name)?
            .ok_or_else(|| LeseError::CollectionNotFound(name.to_string()))
    }

    /// Visible records of a collection in insertion order.
    fn visible_records(conn: &Connection, collection: &str) -> Result<Vec<EmbeddedChunk>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT id, text, chapter, page, source_offset, embedding, indexed_at
            FROM records
            WHERE collection = ?1 AND visible = 1
            ORDER BY seq
            "#,
        )?;

        let rows = stmt
            .query_map(params![collection], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    Chunk {
                        text: row.get(1)?,
                        chapter: row.get(2)?,
                        page: row.get::<_, i64>(3)? as u32,
                        source_offset: row.get::<_, i64>(4)? as usize,
                    },
                    row.get::<_, Vec<u8>>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, chunk, embedding, indexed_at)| {
                let id = uuid::Uuid::parse_str(&id)
                    .map_err(|e| LeseError::VectorStore(format!("Corrupt record id '{}': {}", id, e)))?;
                if embedding.len() % 4 != 0 {
                    return Err(LeseError::VectorStore(format!(
                        "Corrupt embedding for record {}: {} bytes",
                        id,
                        embedding.len()
                    )));
                }
                let indexed_at = DateTime::parse_from_rfc3339(&indexed_at)
                    .map_err(|e| {
                        LeseError::VectorStore(format!("Corrupt timestamp for record {}: {}", id, e))
                    })?
                    .with_timezone(&Utc);

                Ok(EmbeddedChunk::from_parts(
                    id,
                    chunk,
                    Self::bytes_to_embedding(&embedding),
                    indexed_at,
                ))
            })
            .collect()
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self))]
    async fn create_collection(
        &self,
        name: &str,
        dimension: usize,
        metric: SimilarityMetric,
    ) -> Result<CollectionInfo> {
        let conn = self.lock()?;

        if let Some(existing) = Self::collection_info(&conn, name)? {
            if existing.dimension != dimension || existing.metric != metric {
                return Err(LeseError::Config(format!(
                    "Collection '{}' exists with dimension {} and metric {}",
                    name, existing.dimension, existing.metric
                )));
            }
            return Ok(existing);
        }

        conn.execute(
            "INSERT INTO collections (name, dimension, metric, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![name, dimension as i64, metric.to_string(), Utc::now().to_rfc3339()],
        )?;

        info!("Created collection {} (dimension {}, {})", name, dimension, metric);
        Self::require_collection(&conn, name)
    }

    #[instrument(skip(self))]
    async fn drop_collection(&self, name: &str) -> Result<()> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        let deleted = tx.execute("DELETE FROM records WHERE collection = ?1", params![name])?;
        let removed = tx.execute("DELETE FROM collections WHERE name = ?1", params![name])?;
        if removed == 0 {
            return Err(LeseError::CollectionNotFound(name.to_string()));
        }

        tx.commit()?;
        info!("Dropped collection {} ({} records)", name, deleted);
        Ok(())
    }

    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn insert(&self, collection: &str, records: &[EmbeddedChunk]) -> Result<usize> {
        let conn = self.lock()?;
        let info = Self::require_collection(&conn, collection)?;
        check_dimensions(info.dimension, records)?;

        let tx = conn.unchecked_transaction()?;
        for record in records {
            let chunk = record.chunk();
            tx.execute(
                r#"
                INSERT INTO records
                (id, collection, text, chapter, page, source_offset, embedding, indexed_at, visible)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)
                "#,
                params![
                    record.id().to_string(),
                    collection,
                    chunk.text,
                    chunk.chapter,
                    chunk.page as i64,
                    chunk.source_offset as i64,
                    Self::embedding_to_bytes(record.embedding()),
                    record.indexed_at().to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;

        debug!("Inserted {} pending records into {}", records.len(), collection);
        Ok(records.len())
    }

    #[instrument(skip(self))]
    async fn flush(&self, collection: &str) -> Result<usize> {
        let conn = self.lock()?;
        Self::require_collection(&conn, collection)?;

        let tx = conn.unchecked_transaction()?;
        let published = tx.execute(
            "UPDATE records SET visible = 1 WHERE collection = ?1 AND visible = 0",
            params![collection],
        )?;
        tx.commit()?;

        let info = Self::require_collection(&conn, collection)?;
        debug!("Flushed {} records in {} ({} visible)", published, collection, info.visible);
        Ok(info.visible)
    }

    #[instrument(skip(self, query))]
    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let conn = self.lock()?;
        let info = Self::require_collection(&conn, collection)?;
        check_query(&info, query, top_k)?;

        let records = Self::visible_records(&conn, collection)?;
        let results = rank(info.metric, query, &records, top_k);

        debug!("Found {} matching records", results.len());
        Ok(results)
    }

    async fn describe(&self, collection: &str) -> Result<CollectionInfo> {
        let conn = self.lock()?;
        Self::require_collection(&conn, collection)
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare("SELECT name FROM collections ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        names
            .iter()
            .map(|name| Self::require_collection(&conn, name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(text: &str, page: u32, embedding: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk::new(
            Chunk {
                text: text.to_string(),
                chapter: "CHAPTER I".to_string(),
                page,
                source_offset: 42,
            },
            embedding,
        )
    }

    #[tokio::test]
    async fn test_sqlite_vector_store() {
        let store = SqliteVectorStore::in_memory().unwrap();
        store
            .create_collection("books", 3, SimilarityMetric::Cosine)
            .await
            .unwrap();

        let inserted = record("This is test content", 1, vec![1.0, 0.0, 0.0]);
        store.insert("books", &[inserted.clone()]).await.unwrap();

        let info = store.describe("books").await.unwrap();
        assert_eq!((info.visible, info.pending), (0, 1));

        assert_eq!(store.flush("books").await.unwrap(), 1);

        let results = store.search("books", &[1.0, 0.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 1.0).abs() < 0.001);
        assert_eq!(results[0].chunk.id(), inserted.id());
        assert_eq!(results[0].chunk.chunk(), inserted.chunk());
        assert_eq!(results[0].chunk.embedding(), inserted.embedding());

        store.drop_collection("books").await.unwrap();
        assert!(matches!(
            store.describe("books").await,
            Err(LeseError::CollectionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_rows_are_errors() {
        let store = SqliteVectorStore::in_memory().unwrap();
        store.create_collection("books", 2, SimilarityMetric::Dot).await.unwrap();
        store.insert("books", &[record("a", 1, vec![1.0, 1.0])]).await.unwrap();
        store.flush("books").await.unwrap();

        store
            .lock()
            .unwrap()
            .execute("UPDATE records SET indexed_at = 'yesterday'", [])
            .unwrap();
        assert!(matches!(
            store.search("books", &[1.0, 1.0], 1).await,
            Err(LeseError::VectorStore(_))
        ));

        store
            .lock()
            .unwrap()
            .execute("UPDATE records SET id = 'not-a-uuid'", [])
            .unwrap();
        assert!(matches!(
            store.search("books", &[1.0, 1.0], 1).await,
            Err(LeseError::VectorStore(_))
        ));
    }

    #[tokio::test]
    async fn test_search_before_flush_is_empty_collection() {
        let store = SqliteVectorStore::in_memory().unwrap();
        store.create_collection("books", 2, SimilarityMetric::Dot).await.unwrap();
        store.insert("books", &[record("a", 1, vec![1.0, 1.0])]).await.unwrap();

        assert!(matches!(
            store.search("books", &[1.0, 1.0], 1).await,
            Err(LeseError::EmptyCollection(_))
        ));
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let store = SqliteVectorStore::in_memory().unwrap();
        store.create_collection("books", 2, SimilarityMetric::Cosine).await.unwrap();

        let batch: Vec<EmbeddedChunk> = (1..=4)
            .map(|page| record(&format!("copy {}", page), page, vec![0.5, 0.5]))
            .collect();
        store.insert("books", &batch).await.unwrap();
        store.flush("books").await.unwrap();

        let results = store.search("books", &[1.0, 1.0], 3).await.unwrap();
        let pages: Vec<u32> = results.iter().map(|r| r.chunk.chunk().page).collect();
        assert_eq!(pages, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_leaves_collection_untouched() {
        let store = SqliteVectorStore::in_memory().unwrap();
        store.create_collection("books", 3, SimilarityMetric::Cosine).await.unwrap();

        let batch = vec![record("ok", 1, vec![1.0, 0.0, 0.0]), record("bad", 2, vec![1.0])];
        assert!(matches!(
            store.insert("books", &batch).await,
            Err(LeseError::DimensionMismatch { expected: 3, actual: 1 })
        ));

        let info = store.describe("books").await.unwrap();
        assert_eq!(info.visible + info.pending, 0);
    }

    #[tokio::test]
    async fn test_collections_persist_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.db");

        {
            let store = SqliteVectorStore::new(&path).unwrap();
            store.create_collection("alice", 2, SimilarityMetric::Cosine).await.unwrap();
            store.insert("alice", &[record("Down the rabbit hole.", 1, vec![0.0, 1.0])]).await.unwrap();
            store.flush("alice").await.unwrap();
        }

        let store = SqliteVectorStore::new(&path).unwrap();
        let collections = store.list_collections().await.unwrap();
        assert_eq!(collections.len(), 1);
        assert_eq!(collections[0].name, "alice");
        assert_eq!(collections[0].visible, 1);

        let results = store.search("alice", &[0.0, 1.0], 1).await.unwrap();
        assert_eq!(results[0].chunk.text(), "Down the rabbit hole.");
        assert_eq!(results[0].chunk.chunk().source_offset, 42);

        assert!(matches!(
            store.create_collection("alice", 2, SimilarityMetric::Dot).await,
            Err(LeseError::Config(_))
        ));
    }
}
