//! Doctor command - verify configuration, service database and embedding index.

use crate::cli::Output;
use crate::config::{Settings, VectorStoreProvider};
use crate::records::{SqliteRecordStore, REQUIRED_TABLES};
use crate::vector_store::{SqliteVectorStore, VectorStore};
use console::style;
use std::path::Path;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub async fn run_doctor(settings: &Settings, config_path: &Path) -> anyhow::Result<()> {
    Output::header("Wrench Doctor");
    println!();
    println!("Checking configuration, service database and embedding index...\n");

    let mut checks = Vec::new();

    let sections: [(&str, Vec<CheckResult>); 4] = [
        ("API Configuration", vec![check_openai_api_key()]),
        ("Service Database", check_database(&settings.database_path())),
        ("Embedding Index", vec![check_index(settings).await]),
        ("Configuration", vec![check_config_file(config_path)]),
    ];

    for (title, results) in sections {
        println!("{}", style(title).bold());
        for check in &results {
            check.print();
        }
        checks.extend(results);
        println!();
    }

    // Summary
    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using Wrench.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!(
            "All checks passed with {} warning(s).",
            warnings
        ));
    } else {
        Output::success("All checks passed! Wrench is ready to use.");
    }

    Ok(())
}

/// Check if OpenAI API key is configured.
fn check_openai_api_key() -> CheckResult {
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if key.starts_with("sk-") && key.len() > 20 => {
            let masked = format!("{}...{}", &key[..7], &key[key.len() - 4..]);
            CheckResult::ok("OPENAI_API_KEY", &format!("configured ({})", masked))
        }
        Ok(key) if key.is_empty() => CheckResult::error(
            "OPENAI_API_KEY",
            "empty",
            "Set with: export OPENAI_API_KEY='sk-...'",
        ),
        Ok(_) => CheckResult::warning(
            "OPENAI_API_KEY",
            "set but format looks unusual",
            "Expected format: sk-... (OpenAI API key)",
        ),
        Err(_) => CheckResult::error(
            "OPENAI_API_KEY",
            "not set",
            "Set with: export OPENAI_API_KEY='sk-...'",
        ),
    }
}

/// Check the service database exists and carries the expected tables.
fn check_database(path: &Path) -> Vec<CheckResult> {
    if !path.exists() {
        return vec![CheckResult::error(
            "Database",
            &format!("{} not found", path.display()),
            "Set the path with: wrench config set database.path <file>",
        )];
    }

    let size = std::fs::metadata(path)
        .map(|m| format_size(m.len()))
        .unwrap_or_else(|_| "unknown size".to_string());
    let mut results = vec![CheckResult::ok(
        "Database",
        &format!("{} ({})", path.display(), size),
    )];

    let tables = SqliteRecordStore::open(path).and_then(|store| store.missing_tables());
    results.push(match tables {
        Ok(missing) if missing.is_empty() => {
            CheckResult::ok("Tables", &REQUIRED_TABLES.join(", "))
        }
        Ok(missing) => CheckResult::error(
            "Tables",
            &format!("missing {}", missing.join(", ")),
            "Point database.path at the service history database",
        ),
        Err(e) => CheckResult::error(
            "Tables",
            &format!("could not read: {}", e),
            "Check the file is a readable SQLite database",
        ),
    });

    results
}

/// Report how many reports are embedded.
async fn check_index(settings: &Settings) -> CheckResult {
    if settings.vector_store.provider == VectorStoreProvider::Memory {
        return CheckResult::ok("Index", "in-memory, built on first use");
    }

    let path = settings.vector_store_path();
    if !path.exists() {
        return CheckResult::warning(
            "Index",
            &format!("{} (not created yet)", path.display()),
            "Build it with: wrench index",
        );
    }

    let count = match SqliteVectorStore::open_read_only(&path) {
        Ok(store) => store.count().await,
        Err(e) => Err(e),
    };
    match count {
        Ok(0) => CheckResult::warning(
            "Index",
            &format!("{} (empty)", path.display()),
            "Build it with: wrench index",
        ),
        Ok(n) => CheckResult::ok("Index", &format!("{} ({} reports)", path.display(), n)),
        Err(e) => CheckResult::error(
            "Index",
            &format!("could not read: {}", e),
            "Rebuild it with: wrench index --force",
        ),
    }
}

/// Check if config file exists.
fn check_config_file(config_path: &Path) -> CheckResult {
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: wrench config set <section.key> <value>",
        )
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::SCHEMA;
    use rusqlite::Connection;

    #[test]
    fn test_check_result_error() {
        let result = CheckResult::error("test", "failed", "fix it");
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.hint, Some("fix it".to_string()));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
    }

    #[test]
    fn test_missing_database_is_error() {
        let results = check_database(Path::new("/nonexistent/masterData.sqlite3"));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, CheckStatus::Error);
    }

    #[tokio::test]
    async fn test_index_check_does_not_create_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.vector_store.sqlite_path =
            dir.path().join("index").join("reports.db").display().to_string();

        let result = check_index(&settings).await;
        assert_eq!(result.status, CheckStatus::Warning);
        assert!(!dir.path().join("index").exists());
    }

    #[tokio::test]
    async fn test_index_check_reports_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports.db");
        drop(SqliteVectorStore::new(&path).unwrap());
        let mut settings = Settings::default();
        settings.vector_store.sqlite_path = path.display().to_string();

        let result = check_index(&settings).await;
        assert_eq!(result.status, CheckStatus::Warning);
        assert!(result.message.contains("(empty)"));
    }

    #[test]
    fn test_database_tables_checked() {
        let dir = tempfile::tempdir().unwrap();

        let good = dir.path().join("good.sqlite3");
        Connection::open(&good).unwrap().execute_batch(SCHEMA).unwrap();
        let results = check_database(&good);
        assert!(results.iter().all(|r| r.status == CheckStatus::Ok));

        let bare = dir.path().join("bare.sqlite3");
        Connection::open(&bare)
            .unwrap()
            .execute_batch("CREATE TABLE Machines (Serial TEXT);")
            .unwrap();
        let results = check_database(&bare);
        assert_eq!(results[1].status, CheckStatus::Error);
        assert!(results[1].message.contains("ServiceReports"));
    }
}
