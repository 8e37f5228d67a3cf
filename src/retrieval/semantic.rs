//! Similarity-ranked report retrieval.

use super::parts_line;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::records::{MachineFilter, RecordStore};
use crate::vector_store::{MetadataFilter, VectorStore};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// A ranked report id. Lower distance is more similar.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticHit {
    pub report_id: String,
    pub distance: f32,
}

impl SemanticHit {
    /// Similarity shown to the model, `1 - distance`.
    pub fn relevance(&self) -> f32 {
        1.0 - self.distance
    }
}

/// Ranks embedded reports against a free-text query.
pub struct SemanticRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorStore>,
    records: Arc<dyn RecordStore>,
    parts_per_report: usize,
}

impl SemanticRetriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorStore>,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            embedder,
            index,
            records,
            parts_per_report: 3,
        }
    }

    /// Set the number of parts listed per report.
    pub fn with_parts_per_report(mut self, parts_per_report: usize) -> Self {
        self.parts_per_report = parts_per_report;
        self
    }

    /// Up to `limit` report ids ordered by ascending distance.
    ///
    /// A failed query embedding yields no hits rather than an error.
    #[instrument(skip(self, query))]
    pub async fn search(
        &self,
        query: &str,
        filter: &MachineFilter,
        limit: usize,
    ) -> Result<Vec<SemanticHit>> {
        let embedded = self.embedder.embed(query).await;
        let embedding = match embedded.and_then(|e| self.embedder.check_dimensions(&e).map(|_| e)) {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!("Query embedding failed, skipping semantic retrieval: {}", e);
                return Ok(Vec::new());
            }
        };

        let hits = self
            .index
            .query(&embedding, limit, &MetadataFilter::from(filter))
            .await?;

        debug!("Semantic search returned {} hits", hits.len());

        Ok(hits
            .into_iter()
            .map(|h| SemanticHit {
                report_id: h.id,
                distance: h.distance,
            })
            .collect())
    }

    /// `Semantically Relevant Service Reports:` section for the hits.
    ///
    /// Rows are re-read from the record store; ids missing there are skipped.
    /// Returns `None` when nothing could be rendered.
    pub async fn render(&self, hits: &[SemanticHit]) -> Result<Option<String>> {
        let mut out = String::from("Semantically Relevant Service Reports:\n");
        let mut rendered = 0;

        for hit in hits {
            let Some(report) = self.records.report(&hit.report_id).await? else {
                debug!("Indexed report {} no longer exists", hit.report_id);
                continue;
            };

            let _ = writeln!(
                out,
                "\nService Report {} (relevance: {:.2}):",
                report.id,
                hit.relevance()
            );
            let _ = writeln!(out, "Model: {}", report.model.as_deref().unwrap_or("N/A"));
            let _ = writeln!(out, "Date: {}", report.date.as_deref().unwrap_or("N/A"));
            for (label, value) in [
                ("Issue", &report.work_required),
                ("Solution", &report.service_performed),
                ("Verification", &report.verification_test),
            ] {
                if let Some(text) = value.as_deref().filter(|t| !t.is_empty()) {
                    let _ = writeln!(out, "{}: {}", label, text);
                }
            }

            let parts = self.records.report_parts(&report.id).await?;
            if let Some(line) = parts_line(&parts, self.parts_per_report) {
                out.push_str(&line);
            }
            rendered += 1;
        }

        Ok((rendered > 0).then_some(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::Indexer;
    use crate::test_support::{seeded_records, HashEmbedder};
    use crate::vector_store::MemoryVectorStore;

    async fn indexed_retriever() -> SemanticRetriever {
        let records: Arc<dyn RecordStore> = Arc::new(seeded_records());
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new());
        let index: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::new());

        Indexer::new(records.clone(), embedder.clone(), index.clone())
            .ensure_indexed()
            .await
            .unwrap();

        SemanticRetriever::new(embedder, index, records)
    }

    #[tokio::test]
    async fn test_hits_sorted_by_distance() {
        let retriever = indexed_retriever().await;
        let hits = retriever
            .search("spindle will not start", &MachineFilter::default(), 5)
            .await
            .unwrap();

        assert_eq!(hits.len(), 4);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert!(hits[0].report_id == "1" || hits[0].report_id == "2");
    }

    #[tokio::test]
    async fn test_unfiltered_is_superset_of_filtered() {
        let retriever = indexed_retriever().await;
        let query = "coolant pump spindle turret";
        let all = retriever
            .search(query, &MachineFilter::default(), 50)
            .await
            .unwrap();

        for filter in [
            MachineFilter::new(Some("VF-4"), None),
            MachineFilter::new(None, Some("2200001")),
            MachineFilter::new(Some("VF"), Some("1100002")),
        ] {
            let filtered = retriever.search(query, &filter, 50).await.unwrap();
            assert!(!filtered.is_empty());
            for hit in &filtered {
                assert!(all.iter().any(|h| h.report_id == hit.report_id));
            }
        }
    }

    #[tokio::test]
    async fn test_serial_filter_is_exact() {
        let retriever = indexed_retriever().await;
        let hits = retriever
            .search("coolant", &MachineFilter::new(None, Some("1100002")), 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].report_id, "3");
    }

    #[tokio::test]
    async fn test_render_is_untruncated_with_relevance() {
        let retriever = indexed_retriever().await;
        let hits = vec![SemanticHit {
            report_id: "1".to_string(),
            distance: 0.125,
        }];
        let section = retriever.render(&hits).await.unwrap().unwrap();

        assert!(section.starts_with("Semantically Relevant Service Reports:\n"));
        assert!(section.contains("Service Report 1 (relevance: 0.88):"));
        assert!(section.contains("Model: VF-4\nDate: 2023-01-10\n"));
        assert!(section.contains("Verification: Spindle ran 30 minutes at 8000 rpm\n"));
        assert!(section.contains("Parts Used: 93-1000 (Spindle drive fuse), 32-5000 (Drive cable), 20-0001 (Spacer)"));
    }

    #[tokio::test]
    async fn test_render_skips_missing_reports() {
        let retriever = indexed_retriever().await;
        let hits = vec![SemanticHit {
            report_id: "404".to_string(),
            distance: 0.0,
        }];
        assert!(retriever.render(&hits).await.unwrap().is_none());
        assert!(retriever.render(&[]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_embedding_failure_yields_no_hits() {
        let records: Arc<dyn RecordStore> = Arc::new(seeded_records());
        let index: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::new());
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::failing_on("spindle"));
        let retriever = SemanticRetriever::new(embedder, index, records);

        let hits = retriever
            .search("spindle noise", &MachineFilter::default(), 5)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }
}
