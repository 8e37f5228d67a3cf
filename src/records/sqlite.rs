//! SQLite-backed record store.
//!
//! Opens the service-history database read-only. Ids and dates are read
//! through SQLite's dynamic typing so integer and text keys both work.

use super::{
    CommonIssue, HistoryRow, Machine, MachineFilter, RecordStore, ReportPart, ReportSummary,
    ServiceReport,
};
use crate::error::{Result, WrenchError};
use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

/// Tables the assistant reads from.
pub const REQUIRED_TABLES: [&str; 3] = ["Machines", "ServiceReports", "ServiceReportParts"];

/// SQLite-based record store.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Open an existing database read-only.
    #[instrument(skip_all)]
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(WrenchError::RecordStore(format!(
                "Database not found at {}",
                path.display()
            )));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        info!("Opened service history database at {:?}", path);

        Ok(Self::from_connection(conn))
    }

    /// Wrap an already-open connection (useful for testing).
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| WrenchError::RecordStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Names of required tables that are absent from the database.
    pub fn missing_tables(&self) -> Result<Vec<&'static str>> {
        let conn = self.conn()?;
        let mut missing = Vec::new();
        for table in REQUIRED_TABLES {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
                |row| row.get(0),
            )?;
            if count == 0 {
                missing.push(table);
            }
        }
        Ok(missing)
    }

    /// Close the connection, surfacing any error SQLite reports on close.
    pub fn close(self) -> Result<()> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|e| WrenchError::RecordStore(format!("Poisoned connection: {}", e)))?;
        conn.close().map_err(|(_, e)| WrenchError::Database(e))
    }
}

/// Read a column of any storage class as text.
fn text_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Text(s) => Some(s),
        Value::Blob(b) => Some(String::from_utf8_lossy(&b).into_owned()),
    })
}

fn report_from_row(row: &Row<'_>) -> rusqlite::Result<ServiceReport> {
    Ok(ServiceReport {
        id: text_at(row, 0)?.unwrap_or_default(),
        serial: text_at(row, 1)?,
        model: text_at(row, 2)?,
        date: text_at(row, 3)?,
        work_required: text_at(row, 4)?,
        service_performed: text_at(row, 5)?,
        verification_test: text_at(row, 6)?,
        failure_type: text_at(row, 7)?,
        service_type: text_at(row, 8)?,
    })
}

const REPORT_COLUMNS: &str = "ServiceReport_id, Serial, Model, Date, WorkRequired, \
     ServicePerformed, VerificationTest, Failure_Type, ServiceType";

#[async_trait]
impl RecordStore for SqliteRecordStore {
    #[instrument(skip(self))]
    async fn machine_history(&self, filter: &MachineFilter, limit: usize) -> Result<Vec<HistoryRow>> {
        let mut sql = String::from(
            r#"
            SELECT DISTINCT
                m.Serial, m.Model, m.Install_Date,
                sr.ServiceReport_id, sr.Date, sr.WorkRequired, sr.ServicePerformed,
                sr.VerificationTest, sr.Failure_Type, sr.ServiceType
            FROM Machines m
            LEFT JOIN ServiceReports sr ON m.Serial = sr.Serial
            WHERE 1=1
            "#,
        );

        let mut values: Vec<Value> = Vec::new();
        if let Some(model) = &filter.model {
            sql.push_str(" AND m.Model LIKE ?");
            values.push(Value::Text(format!("%{}%", model)));
        }
        if let Some(serial) = &filter.serial {
            sql.push_str(" AND m.Serial = ?");
            values.push(Value::Text(serial.clone()));
        }
        sql.push_str(" ORDER BY sr.Date DESC LIMIT ?");
        values.push(Value::Integer(limit as i64));

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt.query_map(params_from_iter(values), |row| {
            let machine = Machine {
                serial: text_at(row, 0)?.unwrap_or_default(),
                model: text_at(row, 1)?,
                install_date: text_at(row, 2)?,
            };

            let report = match text_at(row, 3)? {
                Some(id) => Some(ReportSummary {
                    id,
                    date: text_at(row, 4)?,
                    work_required: text_at(row, 5)?,
                    service_performed: text_at(row, 6)?,
                    verification_test: text_at(row, 7)?,
                    failure_type: text_at(row, 8)?,
                    service_type: text_at(row, 9)?,
                }),
                None => None,
            };

            Ok(HistoryRow { machine, report })
        })?;

        let history = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        debug!("Found {} history rows", history.len());
        Ok(history)
    }

    #[instrument(skip(self))]
    async fn report_parts(&self, report_id: &str) -> Result<Vec<ReportPart>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT PartNumber, Description FROM ServiceReportParts WHERE ServiceReport_id = ?1",
        )?;

        let rows = stmt.query_map(params![report_id], |row| {
            Ok(ReportPart {
                part_number: text_at(row, 0)?.unwrap_or_default(),
                description: text_at(row, 1)?,
            })
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    #[instrument(skip(self))]
    async fn common_issues(&self, model: &str, limit: usize) -> Result<Vec<CommonIssue>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT WorkRequired, ServicePerformed, COUNT(*) AS frequency
            FROM ServiceReports
            WHERE Model LIKE ?1
            GROUP BY WorkRequired, ServicePerformed
            ORDER BY frequency DESC
            LIMIT ?2
            "#,
        )?;

        let rows = stmt.query_map(params![format!("%{}%", model), limit as i64], |row| {
            let frequency: i64 = row.get(2)?;
            Ok(CommonIssue {
                work_required: text_at(row, 0)?.unwrap_or_default(),
                service_performed: text_at(row, 1)?.unwrap_or_default(),
                frequency: frequency as u32,
            })
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    #[instrument(skip(self))]
    async fn report(&self, report_id: &str) -> Result<Option<ServiceReport>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM ServiceReports WHERE ServiceReport_id = ?1",
            REPORT_COLUMNS
        );

        match conn.query_row(&sql, params![report_id], report_from_row) {
            Ok(report) => Ok(Some(report)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn all_reports(&self) -> Result<Vec<ServiceReport>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM ServiceReports ORDER BY ServiceReport_id",
            REPORT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], report_from_row)?;

        let reports = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        debug!("Loaded {} service reports", reports.len());
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seeded_records, SCHEMA};

    #[tokio::test]
    async fn test_history_by_model_is_newest_first() {
        let store = seeded_records();
        let rows = store
            .machine_history(&MachineFilter::new(Some("VF-4"), None), 10)
            .await
            .unwrap();

        // VF-4 and VF-4SS both match the substring.
        assert_eq!(rows.len(), 3);
        let dates: Vec<_> = rows
            .iter()
            .map(|r| r.report.as_ref().unwrap().date.clone().unwrap())
            .collect();
        assert_eq!(dates, vec!["2023-06-02", "2023-01-10", "2022-11-15"]);
    }

    #[tokio::test]
    async fn test_history_by_serial_is_exact() {
        let store = seeded_records();
        let rows = store
            .machine_history(&MachineFilter::new(None, Some("1100002")), 10)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].machine.model.as_deref(), Some("VF-4SS"));

        let rows = store
            .machine_history(&MachineFilter::new(None, Some("110000")), 10)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_history_respects_limit() {
        let store = seeded_records();
        let rows = store
            .machine_history(&MachineFilter::new(Some("VF"), None), 2)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_machine_without_reports_is_left_joined() {
        let store = seeded_records();
        let rows = store
            .machine_history(&MachineFilter::new(Some("UMC-750"), None), 10)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].report.is_none());
        assert_eq!(rows[0].machine.install_date.as_deref(), Some("2021-05-05"));
    }

    #[tokio::test]
    async fn test_no_match_is_empty() {
        let store = seeded_records();
        let rows = store
            .machine_history(&MachineFilter::new(Some("EC-1600"), None), 10)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_parts_with_integer_ids() {
        let store = seeded_records();
        let parts = store.report_parts("1").await.unwrap();
        assert_eq!(parts.len(), 4);
        assert!(parts.iter().any(|p| p.part_number == "93-1000"));

        assert!(store.report_parts("999").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_common_issues_ranked_by_frequency() {
        let store = seeded_records();
        let issues = store.common_issues("VF-4", 3).await.unwrap();
        assert_eq!(issues[0].frequency, 2);
        assert!(issues[0].work_required.starts_with("Spindle will not start"));
        assert!(issues.windows(2).all(|w| w[0].frequency >= w[1].frequency));
    }

    #[tokio::test]
    async fn test_report_lookup() {
        let store = seeded_records();
        let report = store.report("3").await.unwrap().unwrap();
        assert_eq!(report.id, "3");
        assert_eq!(report.model.as_deref(), Some("VF-4SS"));

        assert!(store.report("404").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_all_reports() {
        let store = seeded_records();
        let reports = store.all_reports().await.unwrap();
        assert_eq!(reports.len(), 5);
        assert_eq!(reports[0].id, "1");
    }

    #[test]
    fn test_open_missing_file_is_connection_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = SqliteRecordStore::open(&dir.path().join("nope.sqlite3"))
            .err()
            .unwrap();
        assert!(err.is_connection_failure());
    }

    #[tokio::test]
    async fn test_open_file_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("masterData.sqlite3");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(SCHEMA).unwrap();
        }

        let store = SqliteRecordStore::open(&path).unwrap();
        assert!(store.missing_tables().unwrap().is_empty());
        assert!(store.all_reports().await.unwrap().is_empty());
        store.close().unwrap();
    }

    #[test]
    fn test_missing_tables_reported() {
        let store = SqliteRecordStore::from_connection(Connection::open_in_memory().unwrap());
        assert_eq!(store.missing_tables().unwrap(), REQUIRED_TABLES.to_vec());
    }
}
