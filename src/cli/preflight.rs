//! Pre-flight checks before expensive operations.
//!
//! Validates that the API key and service database are available
//! before starting operations that would otherwise fail midway.

use crate::config::Settings;
use crate::error::{Result, WrenchError};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Chatting needs the API key and the service database.
    Chat,
    /// Indexing and semantic search need the API key for embeddings and the database.
    Embed,
    /// Printing history only needs the database.
    History,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Chat | Operation::Embed => {
            check_api_key()?;
            check_database(settings)?;
        }
        Operation::History => {
            check_database(settings)?;
        }
    }
    Ok(())
}

/// Check if OpenAI API key is configured.
fn check_api_key() -> Result<()> {
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(()),
        Ok(_) => Err(WrenchError::Config(
            "OPENAI_API_KEY is empty. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
        Err(_) => Err(WrenchError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
    }
}

/// Check that the service database file exists.
fn check_database(settings: &Settings) -> Result<()> {
    let path = settings.database_path();
    if path.exists() {
        Ok(())
    } else {
        Err(WrenchError::Config(format!(
            "Service database not found at {}. Set database.path with: wrench config set database.path <file>",
            path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_needs_database() {
        let mut settings = Settings::default();
        settings.database.path = "/nonexistent/masterData.sqlite3".to_string();
        let err = check(Operation::History, &settings).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/masterData.sqlite3"));
    }

    #[test]
    fn test_history_passes_with_database() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut settings = Settings::default();
        settings.database.path = file.path().display().to_string();
        assert!(check(Operation::History, &settings).is_ok());
    }
}
