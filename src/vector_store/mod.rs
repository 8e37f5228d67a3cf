//! Vector store abstraction for Wrench.
//!
//! Holds one embedding per service report and answers nearest-neighbour
//! queries filtered by report metadata. The index only ranks report ids;
//! the service-history database stays the source of truth.

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::error::Result;
use crate::records::{MachineFilter, ServiceReport};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata stored alongside each embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub model: Option<String>,
    pub serial: Option<String>,
    pub date: Option<String>,
    pub service_report_id: String,
}

impl From<&ServiceReport> for ReportMetadata {
    fn from(report: &ServiceReport) -> Self {
        Self {
            model: report.model.clone(),
            serial: report.serial.clone(),
            date: report.date.clone(),
            service_report_id: report.id.clone(),
        }
    }
}

/// An embedded service report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Service report id.
    pub id: String,
    /// The text that was embedded.
    pub document: String,
    pub metadata: ReportMetadata,
    pub embedding: Vec<f32>,
    /// When this record was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl EmbeddingRecord {
    /// Create a new record.
    pub fn new(id: String, document: String, metadata: ReportMetadata, embedding: Vec<f32>) -> Self {
        Self {
            id,
            document,
            metadata,
            embedding,
            indexed_at: Utc::now(),
        }
    }
}

/// A query hit. Lower distance is more similar.
#[derive(Debug, Clone)]
pub struct IndexHit {
    pub id: String,
    pub distance: f32,
    pub document: String,
    pub metadata: ReportMetadata,
}

/// Metadata filter for queries and deletes.
///
/// `model` is a case-insensitive substring match, `serial` is exact.
/// An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    pub model: Option<String>,
    pub serial: Option<String>,
}

impl MetadataFilter {
    pub fn is_empty(&self) -> bool {
        self.model.is_none() && self.serial.is_none()
    }

    /// Whether a record's metadata passes this filter.
    pub fn matches(&self, metadata: &ReportMetadata) -> bool {
        let model_ok = match &self.model {
            Some(needle) => metadata
                .model
                .as_deref()
                .is_some_and(|m| m.to_lowercase().contains(&needle.to_lowercase())),
            None => true,
        };
        let serial_ok = match &self.serial {
            Some(serial) => metadata.serial.as_deref() == Some(serial.as_str()),
            None => true,
        };
        model_ok && serial_ok
    }
}

impl From<&MachineFilter> for MetadataFilter {
    fn from(filter: &MachineFilter) -> Self {
        Self {
            model: filter.model.clone(),
            serial: filter.serial.clone(),
        }
    }
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace records by id.
    async fn upsert_batch(&self, records: &[EmbeddingRecord]) -> Result<usize>;

    /// Nearest records to `query_embedding` passing `filter`, ascending by distance.
    async fn query(
        &self,
        query_embedding: &[f32],
        limit: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<IndexHit>>;

    /// Total record count.
    async fn count(&self) -> Result<usize>;

    /// Delete records passing `filter`. Returns the number removed.
    async fn delete(&self, filter: &MetadataFilter) -> Result<usize>;
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

/// Cosine distance in `[0, 2]`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Sort hits by ascending distance (ties by id) and keep the first `limit`.
pub(crate) fn rank_hits(mut hits: Vec<IndexHit>, limit: usize) -> Vec<IndexHit> {
    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    hits.truncate(limit);
    hits
}
