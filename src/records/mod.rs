//! Read-only access to the service-history database.
//!
//! The database holds three tables maintained by external data entry:
//! `Machines`, `ServiceReports` and `ServiceReportParts`. Everything here
//! returns named record types rather than raw rows.

mod sqlite;

pub use sqlite::{SqliteRecordStore, REQUIRED_TABLES};

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A machine as recorded in `Machines`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub serial: String,
    pub model: Option<String>,
    pub install_date: Option<String>,
}

/// The report half of a machine history row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub id: String,
    pub date: Option<String>,
    pub work_required: Option<String>,
    pub service_performed: Option<String>,
    pub verification_test: Option<String>,
    pub failure_type: Option<String>,
    pub service_type: Option<String>,
}

/// One row of the machine/report left join.
///
/// `report` is `None` for machines without any service reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub machine: Machine,
    pub report: Option<ReportSummary>,
}

/// A part used on a service report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPart {
    pub part_number: String,
    pub description: Option<String>,
}

impl ReportPart {
    /// `PartNumber (Description)`.
    pub fn label(&self) -> String {
        format!(
            "{} ({})",
            self.part_number,
            self.description.as_deref().unwrap_or("")
        )
    }
}

/// A recurring (problem, solution) pair and how often it occurs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonIssue {
    pub work_required: String,
    pub service_performed: String,
    pub frequency: u32,
}

/// A full row from `ServiceReports`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceReport {
    pub id: String,
    pub serial: Option<String>,
    pub model: Option<String>,
    pub date: Option<String>,
    pub work_required: Option<String>,
    pub service_performed: Option<String>,
    pub verification_test: Option<String>,
    pub failure_type: Option<String>,
    pub service_type: Option<String>,
}

impl ServiceReport {
    /// Text that gets embedded for this report.
    ///
    /// Empty fields are left out, so a report with nothing filled in renders
    /// as an empty string.
    pub fn document_text(&self) -> String {
        [
            ("Model", &self.model),
            ("Issue", &self.work_required),
            ("Solution", &self.service_performed),
            ("Verification", &self.verification_test),
        ]
        .iter()
        .filter_map(|(label, value)| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| format!("{}: {}", label, v))
        })
        .collect::<Vec<_>>()
        .join("\n")
    }
}

/// Model substring and/or exact serial used to select machines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MachineFilter {
    pub model: Option<String>,
    pub serial: Option<String>,
}

impl MachineFilter {
    /// Build a filter, treating blank strings as absent.
    pub fn new(model: Option<&str>, serial: Option<&str>) -> Self {
        let clean = |v: Option<&str>| {
            v.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Self {
            model: clean(model),
            serial: clean(serial),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.model.is_none() && self.serial.is_none()
    }
}

/// Read-only queries over the service-history database.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Most recent machine/report rows matching the filter, newest first.
    async fn machine_history(&self, filter: &MachineFilter, limit: usize) -> Result<Vec<HistoryRow>>;

    /// All parts recorded against a report.
    async fn report_parts(&self, report_id: &str) -> Result<Vec<ReportPart>>;

    /// Most frequent (work required, service performed) pairs for a model substring.
    async fn common_issues(&self, model: &str, limit: usize) -> Result<Vec<CommonIssue>>;

    /// A single report, or `None` if it does not exist.
    async fn report(&self, report_id: &str) -> Result<Option<ServiceReport>>;

    /// Every report in the database.
    async fn all_reports(&self) -> Result<Vec<ServiceReport>>;
}
