//! Index command implementation.

use crate::assistant::Backends;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;

/// Run the index command.
pub async fn run_index(force: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Embed, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'wrench doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let backends = Backends::open(&settings)?;
    let indexer = backends.indexer(&settings);

    let spinner = Output::spinner(if force {
        "Rebuilding embedding index..."
    } else {
        "Indexing service reports..."
    });
    let result = if force {
        indexer.rebuild().await
    } else {
        indexer.ensure_indexed().await
    };
    spinner.finish_and_clear();

    match result {
        Ok(report) => {
            Output::index_report(&report);
            Output::kv("Vector store", &settings.vector_store.provider.to_string());
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Indexing failed: {}", e));
            Err(e.into())
        }
    }
}
