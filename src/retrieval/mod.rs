//! Retrieval of service history for a machine.
//!
//! Two retrievers feed the context assembler:
//!
//! - [`KeywordRetriever`] selects the most recent reports for a model/serial
//!   and summarizes the model's most frequent issues.
//! - [`SemanticRetriever`] ranks embedded reports by similarity to a
//!   free-text description of the problem.

pub mod keyword;
pub mod semantic;

pub use keyword::KeywordRetriever;
pub use semantic::{SemanticHit, SemanticRetriever};

use crate::records::ReportPart;

/// Shown instead of a context block when no machine matches.
pub const NO_HISTORY_MESSAGE: &str = "No service history found for the specified machine.";

pub(crate) const CONTEXT_HEADER: &str = "Machine Service History Analysis:\n\n";

/// Cut `text` to at most `max` characters. No ellipsis is added.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// `Parts Used: A (x), B (y)` for up to `max` parts, or `None` when there are none.
pub(crate) fn parts_line(parts: &[ReportPart], max: usize) -> Option<String> {
    if parts.is_empty() || max == 0 {
        return None;
    }
    let listed = parts
        .iter()
        .take(max)
        .map(ReportPart::label)
        .collect::<Vec<_>>()
        .join(", ");
    Some(format!("Parts Used: {}\n", listed))
}
