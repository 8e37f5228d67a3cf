//! CLI output formatting utilities.

use crate::indexer::{ClearOutcome, IndexReport};
use crate::retrieval::SemanticHit;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a semantic search hit with a preview of the report.
    pub fn search_hit(hit: &SemanticHit, model: &str, date: &str, issue: &str) {
        println!(
            "\n{} {} {} ({}, {}) (relevance: {:.2})",
            style(">>").green(),
            style("Service Report").bold(),
            style(&hit.report_id).bold(),
            style(model).cyan(),
            date,
            hit.relevance()
        );
        println!("   {}", content_preview(issue, 200));
    }

    /// Print the summary of an indexing run.
    pub fn index_report(report: &IndexReport) {
        if report.was_noop() {
            Output::success("Index already populated, nothing to do.");
            return;
        }

        match &report.clear {
            Some(ClearOutcome::PartialFailure(reason)) => {
                Output::warning(&format!("Could not clear previous index ({}); indexed on top of it", reason));
            }
            Some(ClearOutcome::Cleared(n)) if *n > 0 => {
                Output::info(&format!("Cleared {} previous entries", n));
            }
            _ => {}
        }

        Output::success(&format!(
            "Indexed {} service reports in {} batches",
            report.indexed, report.batches
        ));
        Output::kv("Too short", &report.skipped_short.to_string());
        if report.skipped_failed > 0 {
            Output::kv("Embedding failed", &report.skipped_failed.to_string());
        }
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Flatten newlines and cut to `max_len` characters with an ellipsis.
fn content_preview(content: &str, max_len: usize) -> String {
    let content = content.replace('\n', " ");
    match content.char_indices().nth(max_len) {
        Some((idx, _)) => format!("{}...", &content[..idx]),
        None => content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_preview() {
        assert_eq!(content_preview("a\nb", 10), "a b");
        assert_eq!(content_preview("abcdef", 3), "abc...");
    }
}
