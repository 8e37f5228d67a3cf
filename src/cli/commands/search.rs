//! Search command implementation.

use crate::assistant::Backends;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::records::MachineFilter;
use crate::retrieval::SemanticRetriever;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(
    query: &str,
    model: Option<String>,
    serial: Option<String>,
    limit: usize,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Embed, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'wrench doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let backends = Backends::open(&settings)?;
    let indexer = backends.indexer(&settings);
    let retriever = SemanticRetriever::new(
        backends.embedder.clone(),
        backends.index.clone(),
        backends.records.clone(),
    );
    let filter = MachineFilter::new(model.as_deref(), serial.as_deref());

    let spinner = Output::spinner("Searching service reports...");
    let indexed = indexer.ensure_indexed().await;
    let results = match indexed {
        Ok(_) => retriever.search(query, &filter, limit).await,
        Err(e) => Err(e),
    };
    spinner.finish_and_clear();

    let hits = match results {
        Ok(hits) => hits,
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    };

    if hits.is_empty() {
        Output::warning("No service reports found matching your query.");
        return Ok(());
    }

    Output::success(&format!("Found {} reports", hits.len()));
    for hit in &hits {
        let Some(report) = backends.records.report(&hit.report_id).await? else {
            continue;
        };
        Output::search_hit(
            hit,
            report.model.as_deref().unwrap_or("N/A"),
            report.date.as_deref().unwrap_or("N/A"),
            report.work_required.as_deref().unwrap_or(""),
        );
    }

    Ok(())
}
