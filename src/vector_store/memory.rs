//! In-memory vector store implementation.
//!
//! Useful for testing and small datasets.

use super::{
    check_dimensions, check_query, rank, CollectionInfo, EmbeddedChunk, SearchResult,
    SimilarityMetric, VectorStore,
};
use crate::error::{LeseError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

struct Collection {
    dimension: usize,
    metric: SimilarityMetric,
    /// Inserted, awaiting flush.
    pending: Vec<EmbeddedChunk>,
    /// Searchable, in insertion order.
    visible: Vec<EmbeddedChunk>,
}

impl Collection {
    fn info(&self, name: &str) -> CollectionInfo {
        CollectionInfo {
            name: name.to_string(),
            dimension: self.dimension,
            metric: self.metric,
            visible: self.visible.len(),
            pending: self.pending.len(),
        }
    }
}

/// In-memory vector store.
pub struct MemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Collection>>> {
        self.collections
            .read()
            .map_err(|e| LeseError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Collection>>> {
        self.collections
            .write()
            .map_err(|e| LeseError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn create_collection(
        &self,
        name: &str,
        dimension: usize,
        metric: SimilarityMetric,
    ) -> Result<CollectionInfo> {
        let mut collections = self.write()?;

        if let Some(existing) = collections.get(name) {
            if existing.dimension != dimension || existing.metric != metric {
                return Err(LeseError::Config(format!(
                    "Collection '{}' exists with dimension {} and metric {}",
                    name, existing.dimension, existing.metric
                )));
            }
            return Ok(existing.info(name));
        }

        let collection = Collection {
            dimension,
            metric,
            pending: Vec::new(),
            visible: Vec::new(),
        };
        let info = collection.info(name);
        collections.insert(name.to_string(), collection);
        info!("Created collection {} (dimension {}, {})", name, dimension, metric);
        Ok(info)
    }

    async fn drop_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.write()?;
        collections
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| LeseError::CollectionNotFound(name.to_string()))
    }

    async fn insert(&self, collection: &str, records: &[EmbeddedChunk]) -> Result<usize> {
        let mut collections = self.write()?;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| LeseError::CollectionNotFound(collection.to_string()))?;

        check_dimensions(target.dimension, records)?;
        target.pending.extend_from_slice(records);

        debug!("Inserted {} pending records into {}", records.len(), collection);
        Ok(records.len())
    }

    async fn flush(&self, collection: &str) -> Result<usize> {
        let mut collections = self.write()?;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| LeseError::CollectionNotFound(collection.to_string()))?;

        let pending = std::mem::take(&mut target.pending);
        target.visible.extend(pending);
        Ok(target.visible.len())
    }

    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let collections = self.read()?;
        let target = collections
            .get(collection)
            .ok_or_else(|| LeseError::CollectionNotFound(collection.to_string()))?;

        check_query(&target.info(collection), query, top_k)?;
        Ok(rank(target.metric, query, &target.visible, top_k))
    }

    async fn describe(&self, collection: &str) -> Result<CollectionInfo> {
        let collections = self.read()?;
        collections
            .get(collection)
            .map(|c| c.info(collection))
            .ok_or_else(|| LeseError::CollectionNotFound(collection.to_string()))
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let collections = self.read()?;
        let mut infos: Vec<CollectionInfo> =
            collections.iter().map(|(name, c)| c.info(name)).collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }
}
