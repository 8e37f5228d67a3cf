//! Context assembly for the system turn.

use crate::config::RetrievalSettings;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::indexer::Indexer;
use crate::records::{MachineFilter, RecordStore};
use crate::retrieval::keyword::{common_issue_model, machine_facts};
use crate::retrieval::{KeywordRetriever, SemanticRetriever, CONTEXT_HEADER, NO_HISTORY_MESSAGE};
use crate::vector_store::VectorStore;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Context block for a request, or the absence of any matching machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssembledContext {
    Context(String),
    NotFound,
}

impl AssembledContext {
    /// Text shown to the model or the user; the sentinel for `NotFound`.
    pub fn text(&self) -> &str {
        match self {
            AssembledContext::Context(text) => text,
            AssembledContext::NotFound => NO_HISTORY_MESSAGE,
        }
    }
}

/// Merges keyword and semantic retrieval into one context string.
///
/// Without a query the block carries recent history and common issues.
/// With a query it carries the semantically ranked reports instead, and
/// common issues only when the ranking came back empty.
pub struct ContextAssembler {
    keyword: KeywordRetriever,
    semantic: SemanticRetriever,
    indexer: Arc<Indexer>,
    semantic_limit: usize,
}

impl ContextAssembler {
    pub fn new(
        records: Arc<dyn RecordStore>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorStore>,
        indexer: Arc<Indexer>,
        limits: RetrievalSettings,
    ) -> Self {
        let semantic = SemanticRetriever::new(embedder, index, records.clone())
            .with_parts_per_report(limits.parts_per_report);
        let semantic_limit = limits.semantic_limit;

        Self {
            keyword: KeywordRetriever::new(records, limits),
            semantic,
            indexer,
            semantic_limit,
        }
    }

    /// Assemble context for a machine, ranking by `query` when it is non-blank.
    #[instrument(skip(self, query))]
    pub async fn assemble(
        &self,
        filter: &MachineFilter,
        query: Option<&str>,
    ) -> Result<AssembledContext> {
        match query.map(str::trim).filter(|q| !q.is_empty()) {
            None => Ok(match self.keyword.build(filter).await? {
                Some(context) => AssembledContext::Context(context),
                None => AssembledContext::NotFound,
            }),
            Some(query) => self.assemble_semantic(filter, query).await,
        }
    }

    async fn assemble_semantic(
        &self,
        filter: &MachineFilter,
        query: &str,
    ) -> Result<AssembledContext> {
        let rows = self.keyword.history(filter).await?;
        let Some(first) = rows.first() else {
            return Ok(AssembledContext::NotFound);
        };

        let mut context = String::from(CONTEXT_HEADER);
        context.push_str(&machine_facts(first));

        self.indexer.ensure_indexed().await?;
        let hits = self.semantic.search(query, filter, self.semantic_limit).await?;
        debug!("{} semantic hits for context", hits.len());

        if let Some(section) = self.semantic.render(&hits).await? {
            context.push_str(&section);
        } else if let Some(model) = common_issue_model(filter, &rows) {
            context.push_str(&self.keyword.common_issues(&model).await?);
        }

        Ok(AssembledContext::Context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seeded_records, CountingStore, HashEmbedder};

    struct Fixture {
        assembler: ContextAssembler,
        index: Arc<CountingStore>,
    }

    fn fixture(embedder: HashEmbedder) -> Fixture {
        let records: Arc<dyn RecordStore> = Arc::new(seeded_records());
        let embedder: Arc<dyn Embedder> = Arc::new(embedder);
        let index = Arc::new(CountingStore::new());
        let indexer = Arc::new(Indexer::new(records.clone(), embedder.clone(), index.clone()));

        Fixture {
            assembler: ContextAssembler::new(
                records,
                embedder,
                index.clone(),
                indexer,
                RetrievalSettings::default(),
            ),
            index,
        }
    }

    #[tokio::test]
    async fn test_filter_only_policy() {
        let f = fixture(HashEmbedder::new());
        let context = f
            .assembler
            .assemble(&MachineFilter::new(Some("VF-4"), None), None)
            .await
            .unwrap();

        let text = context.text();
        assert!(text.contains("Recent Service History:"));
        assert!(text.contains("Common Issues for this Model:"));
        assert!(!text.contains("Semantically Relevant"));
        // No query means no indexing.
        assert_eq!(f.index.upserts(), 0);
    }

    #[tokio::test]
    async fn test_blank_query_uses_filter_only_policy() {
        let f = fixture(HashEmbedder::new());
        let context = f
            .assembler
            .assemble(&MachineFilter::new(Some("VF-4"), None), Some("   "))
            .await
            .unwrap();
        assert!(context.text().contains("Recent Service History:"));
    }

    #[tokio::test]
    async fn test_semantic_policy_indexes_lazily() {
        let f = fixture(HashEmbedder::new());
        let context = f
            .assembler
            .assemble(
                &MachineFilter::new(Some("VF-4"), None),
                Some("spindle will not start"),
            )
            .await
            .unwrap();

        let text = context.text();
        assert!(text.starts_with("Machine Service History Analysis:\n\nMachine Details:\n"));
        assert!(text.contains("Semantically Relevant Service Reports:"));
        assert!(text.contains("(relevance: "));
        assert!(!text.contains("Recent Service History:"));
        assert!(!text.contains("Common Issues"));
        assert_eq!(f.index.count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_semantic_policy_falls_back_to_common_issues() {
        let f = fixture(HashEmbedder::failing_on("xyzzy"));
        let context = f
            .assembler
            .assemble(&MachineFilter::new(None, Some("2200001")), Some("xyzzy"))
            .await
            .unwrap();

        let text = context.text();
        assert!(!text.contains("Semantically Relevant"));
        assert!(text.contains("- Problem: Turret will not index"));
    }

    #[tokio::test]
    async fn test_unknown_machine_is_not_found() {
        let f = fixture(HashEmbedder::new());
        for query in [None, Some("spindle")] {
            let context = f
                .assembler
                .assemble(&MachineFilter::new(Some("EC-1600"), None), query)
                .await
                .unwrap();
            assert_eq!(context, AssembledContext::NotFound);
            assert_eq!(context.text(), NO_HISTORY_MESSAGE);
        }
    }
}
