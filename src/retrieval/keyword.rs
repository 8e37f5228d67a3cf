//! Recency-based history retrieval.

use super::{parts_line, truncate_chars, CONTEXT_HEADER};
use crate::config::RetrievalSettings;
use crate::error::Result;
use crate::records::{HistoryRow, MachineFilter, RecordStore};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Builds the filter-based history block for a machine.
pub struct KeywordRetriever {
    records: Arc<dyn RecordStore>,
    limits: RetrievalSettings,
}

impl KeywordRetriever {
    pub fn new(records: Arc<dyn RecordStore>, limits: RetrievalSettings) -> Self {
        Self { records, limits }
    }

    /// Most recent history rows for the filter.
    pub async fn history(&self, filter: &MachineFilter) -> Result<Vec<HistoryRow>> {
        self.records
            .machine_history(filter, self.limits.history_limit)
            .await
    }

    /// Full keyword context: machine facts, recent reports and common issues.
    ///
    /// Returns `None` when nothing matches the filter.
    #[instrument(skip(self))]
    pub async fn build(&self, filter: &MachineFilter) -> Result<Option<String>> {
        let rows = self.history(filter).await?;
        let Some(first) = rows.first() else {
            debug!("No history for {:?}", filter);
            return Ok(None);
        };

        let mut context = String::from(CONTEXT_HEADER);
        context.push_str(&machine_facts(first));
        context.push_str(&self.recent_history(&rows).await?);

        let model = common_issue_model(filter, &rows);
        if let Some(model) = model {
            context.push_str(&self.common_issues(&model).await?);
        }

        Ok(Some(context))
    }

    /// `Recent Service History:` followed by one section per report.
    pub async fn recent_history(&self, rows: &[HistoryRow]) -> Result<String> {
        let limit = self.limits.field_char_limit;
        let mut out = String::from("Recent Service History:\n");

        for report in rows.iter().filter_map(|r| r.report.as_ref()) {
            let _ = writeln!(
                out,
                "\nService Report {} ({}):",
                report.id,
                report.date.as_deref().unwrap_or("N/A")
            );

            for (label, value) in [
                ("Issue", &report.work_required),
                ("Solution", &report.service_performed),
                ("Verification", &report.verification_test),
            ] {
                if let Some(text) = value.as_deref().filter(|t| !t.is_empty()) {
                    let _ = writeln!(out, "{}: {}", label, truncate_chars(text, limit));
                }
            }

            let parts = self.records.report_parts(&report.id).await?;
            if let Some(line) = parts_line(&parts, self.limits.parts_per_report) {
                out.push_str(&line);
            }
        }

        Ok(out)
    }

    /// `Common Issues for this Model:` section, or an empty string when there are none.
    pub async fn common_issues(&self, model: &str) -> Result<String> {
        let issues = self
            .records
            .common_issues(model, self.limits.common_issue_limit)
            .await?;
        if issues.is_empty() {
            return Ok(String::new());
        }

        let limit = self.limits.common_issue_char_limit;
        let mut out = String::from("\nCommon Issues for this Model:\n");
        for issue in &issues {
            let _ = writeln!(out, "- Problem: {}", truncate_chars(&issue.work_required, limit));
            let _ = writeln!(out, "  Solution: {}", truncate_chars(&issue.service_performed, limit));
        }
        Ok(out)
    }
}

/// `Machine Details:` block from a history row.
pub fn machine_facts(row: &HistoryRow) -> String {
    format!(
        "Machine Details:\nModel: {}\nSerial: {}\nInstallation Date: {}\n\n",
        row.machine.model.as_deref().unwrap_or("N/A"),
        row.machine.serial,
        row.machine.install_date.as_deref().unwrap_or("N/A"),
    )
}

/// Model used for the common-issues lookup: the requested model, else the matched machine's.
pub fn common_issue_model(filter: &MachineFilter, rows: &[HistoryRow]) -> Option<String> {
    filter.model.clone().or_else(|| {
        rows.first()
            .and_then(|r| r.machine.model.clone())
            .filter(|m| !m.is_empty())
    })
}
