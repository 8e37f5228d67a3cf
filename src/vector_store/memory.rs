//! In-memory vector store implementation.
//!
//! Useful for testing and small datasets.

use super::{cosine_distance, rank_hits, EmbeddingRecord, IndexHit, MetadataFilter, VectorStore};
use crate::error::{Result, WrenchError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory vector store.
pub struct MemoryVectorStore {
    records: RwLock<HashMap<String, EmbeddingRecord>>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, EmbeddingRecord>>> {
        self.records
            .read()
            .map_err(|e| WrenchError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, EmbeddingRecord>>> {
        self.records
            .write()
            .map_err(|e| WrenchError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert_batch(&self, records: &[EmbeddingRecord]) -> Result<usize> {
        let mut store = self.write()?;
        for record in records {
            store.insert(record.id.clone(), record.clone());
        }
        Ok(records.len())
    }

    async fn query(
        &self,
        query_embedding: &[f32],
        limit: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<IndexHit>> {
        let store = self.read()?;

        let hits: Vec<IndexHit> = store
            .values()
            .filter(|r| filter.matches(&r.metadata))
            .map(|r| IndexHit {
                id: r.id.clone(),
                distance: cosine_distance(query_embedding, &r.embedding),
                document: r.document.clone(),
                metadata: r.metadata.clone(),
            })
            .collect();

        Ok(rank_hits(hits, limit))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    async fn delete(&self, filter: &MetadataFilter) -> Result<usize> {
        let mut store = self.write()?;
        let initial_len = store.len();
        store.retain(|_, r| !filter.matches(&r.metadata));
        Ok(initial_len - store.len())
    }
}
