//! Embedding index maintenance.
//!
//! Embeds every eligible service report and stores it in the vector store.
//! The index is either `Empty` (fewer records than eligible reports) or
//! `Populated`. Populating is a collection-level clear followed by batched
//! upserts. A completed run leaves the index `Populated` even when some
//! reports failed to embed; those are retried only by `rebuild`. Runs within
//! one process are serialized; separate processes indexing the same store are
//! not coordinated.

use crate::embedding::Embedder;
use crate::error::Result;
use crate::records::{RecordStore, ServiceReport};
use crate::vector_store::{EmbeddingRecord, MetadataFilter, ReportMetadata, VectorStore};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Whether the index covers every eligible report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Empty,
    Populated,
}

/// Result of clearing the collection before a rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearOutcome {
    /// All previous records removed.
    Cleared(usize),
    /// Clearing failed; indexing continued on top of whatever was there.
    PartialFailure(String),
}

/// Summary of an indexing run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexReport {
    /// Records written.
    pub indexed: usize,
    /// Reports below the minimum text length.
    pub skipped_short: usize,
    /// Reports whose embedding failed.
    pub skipped_failed: usize,
    /// Upsert calls made.
    pub batches: usize,
    /// `None` when the index was already populated and nothing ran.
    pub clear: Option<ClearOutcome>,
}

impl IndexReport {
    /// Whether this run was a no-op on an already populated index.
    pub fn was_noop(&self) -> bool {
        self.clear.is_none()
    }
}

struct Staged {
    text: String,
    metadata: ReportMetadata,
}

/// Populates the vector store from the record store.
pub struct Indexer {
    records: Arc<dyn RecordStore>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorStore>,
    min_document_chars: usize,
    batch_size: usize,
    populated: AtomicBool,
    /// Reports the last run could not embed.
    unembeddable: AtomicUsize,
    run_lock: Mutex<()>,
}

impl Indexer {
    /// Create an indexer with a 10-character minimum and batches of 100.
    pub fn new(
        records: Arc<dyn RecordStore>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            records,
            embedder,
            index,
            min_document_chars: 10,
            batch_size: 100,
            populated: AtomicBool::new(false),
            unembeddable: AtomicUsize::new(0),
            run_lock: Mutex::new(()),
        }
    }

    /// Set the minimum canonical text length for a report to be indexed.
    pub fn with_min_document_chars(mut self, min_document_chars: usize) -> Self {
        self.min_document_chars = min_document_chars;
        self
    }

    /// Set the number of records per upsert call.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn is_eligible(&self, text: &str) -> bool {
        text.chars().count() >= self.min_document_chars
    }

    /// Compare the index count with the number of eligible reports.
    pub async fn state(&self) -> Result<IndexState> {
        let reports = self.records.all_reports().await?;
        self.state_for(&reports).await
    }

    async fn state_for(&self, reports: &[ServiceReport]) -> Result<IndexState> {
        let eligible = reports
            .iter()
            .filter(|r| self.is_eligible(&r.document_text()))
            .count();
        let count = self.index.count().await?;
        let unembeddable = self.unembeddable.load(Ordering::SeqCst);
        debug!(
            "Index holds {} of {} eligible reports ({} unembeddable)",
            count, eligible, unembeddable
        );

        Ok(if count + unembeddable >= eligible {
            IndexState::Populated
        } else {
            IndexState::Empty
        })
    }

    /// Populate the index if it is `Empty`; otherwise do nothing.
    #[instrument(skip(self))]
    pub async fn ensure_indexed(&self) -> Result<IndexReport> {
        if self.populated.load(Ordering::SeqCst) {
            return Ok(IndexReport::default());
        }

        let _guard = self.run_lock.lock().await;
        if self.populated.load(Ordering::SeqCst) {
            return Ok(IndexReport::default());
        }

        let reports = self.records.all_reports().await?;
        if self.state_for(&reports).await? == IndexState::Populated {
            self.populated.store(true, Ordering::SeqCst);
            return Ok(IndexReport::default());
        }

        self.run(&reports).await
    }

    /// Clear and rebuild regardless of state. Picks up edited reports.
    #[instrument(skip(self))]
    pub async fn rebuild(&self) -> Result<IndexReport> {
        let _guard = self.run_lock.lock().await;
        let reports = self.records.all_reports().await?;
        self.run(&reports).await
    }

    /// Populate and mark the index done. Caller holds `run_lock`.
    async fn run(&self, reports: &[ServiceReport]) -> Result<IndexReport> {
        self.populated.store(false, Ordering::SeqCst);
        let report = self.populate(reports).await?;
        self.unembeddable.store(report.skipped_failed, Ordering::SeqCst);
        self.populated.store(true, Ordering::SeqCst);
        Ok(report)
    }

    async fn populate(&self, reports: &[ServiceReport]) -> Result<IndexReport> {
        info!("Indexing {} service reports", reports.len());

        let clear = self.clear().await;
        let mut summary = IndexReport {
            clear: Some(clear),
            ..IndexReport::default()
        };

        let mut staged = Vec::with_capacity(self.batch_size);
        for report in reports {
            let text = report.document_text();
            if !self.is_eligible(&text) {
                summary.skipped_short += 1;
                continue;
            }

            staged.push(Staged {
                text,
                metadata: ReportMetadata::from(report),
            });

            if staged.len() >= self.batch_size {
                self.flush(&mut staged, &mut summary).await?;
            }
        }

        if !staged.is_empty() {
            self.flush(&mut staged, &mut summary).await?;
        }

        info!(
            "Indexed {} reports in {} batches ({} too short, {} failed)",
            summary.indexed, summary.batches, summary.skipped_short, summary.skipped_failed
        );
        Ok(summary)
    }

    async fn clear(&self) -> ClearOutcome {
        match self.index.delete(&MetadataFilter::default()).await {
            Ok(removed) => {
                debug!("Cleared {} existing records", removed);
                ClearOutcome::Cleared(removed)
            }
            Err(e) => {
                warn!("Failed to clear vector store, indexing additively: {}", e);
                ClearOutcome::PartialFailure(e.to_string())
            }
        }
    }

    /// Embed and upsert the staged entries, leaving `staged` empty.
    async fn flush(&self, staged: &mut Vec<Staged>, summary: &mut IndexReport) -> Result<()> {
        let batch: Vec<Staged> = std::mem::take(staged);
        let texts: Vec<String> = batch.iter().map(|s| s.text.clone()).collect();

        let embeddings: Vec<Option<Vec<f32>>> = match self.embedder.embed_batch(&texts).await {
            Ok(embeddings) if embeddings.len() == texts.len() => embeddings
                .into_iter()
                .map(|e| match self.embedder.check_dimensions(&e) {
                    Ok(()) => Some(e),
                    Err(err) => {
                        warn!("Skipping report, {}", err);
                        None
                    }
                })
                .collect(),
            Ok(embeddings) => {
                warn!(
                    "Batch embedding returned {} vectors for {} texts, retrying individually",
                    embeddings.len(),
                    texts.len()
                );
                self.embed_individually(&texts).await
            }
            Err(e) => {
                warn!("Batch embedding failed, retrying individually: {}", e);
                self.embed_individually(&texts).await
            }
        };

        let records: Vec<EmbeddingRecord> = batch
            .into_iter()
            .zip(embeddings)
            .filter_map(|(entry, embedding)| match embedding {
                Some(embedding) => Some(EmbeddingRecord::new(
                    entry.metadata.service_report_id.clone(),
                    entry.text,
                    entry.metadata,
                    embedding,
                )),
                None => {
                    summary.skipped_failed += 1;
                    None
                }
            })
            .collect();

        if records.is_empty() {
            return Ok(());
        }

        summary.indexed += self.index.upsert_batch(&records).await?;
        summary.batches += 1;
        Ok(())
    }

    async fn embed_individually(&self, texts: &[String]) -> Vec<Option<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            let embedded = self.embedder.embed(text).await;
            match embedded.and_then(|e| self.embedder.check_dimensions(&e).map(|_| e)) {
                Ok(embedding) => out.push(Some(embedding)),
                Err(e) => {
                    warn!("Skipping report, embedding failed: {}", e);
                    out.push(None);
                }
            }
        }
        out
    }
}
