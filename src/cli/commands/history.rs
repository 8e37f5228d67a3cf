//! History command: print the context block the model would see.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::records::{MachineFilter, SqliteRecordStore};
use crate::retrieval::{KeywordRetriever, NO_HISTORY_MESSAGE};
use anyhow::Result;
use std::sync::Arc;

/// Run the history command.
pub async fn run_history(
    model: Option<String>,
    serial: Option<String>,
    settings: Settings,
) -> Result<()> {
    let filter = MachineFilter::new(model.as_deref(), serial.as_deref());
    if filter.is_empty() {
        Output::error("Please provide either a machine model (--model) or serial number (--serial).");
        return Err(anyhow::anyhow!("no machine given"));
    }

    if let Err(e) = preflight::check(Operation::History, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let records = SqliteRecordStore::open(&settings.database_path())?;
    let retriever = KeywordRetriever::new(Arc::new(records), settings.retrieval.clone());

    match retriever.build(&filter).await? {
        Some(context) => println!("{}", context),
        None => Output::warning(NO_HISTORY_MESSAGE),
    }

    Ok(())
}
