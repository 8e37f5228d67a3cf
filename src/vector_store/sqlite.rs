//! SQLite-based vector store implementation.
//!
//! Uses SQLite with cosine distance computed in Rust. Metadata filters are
//! applied in SQL before scoring. The service-report history is small enough
//! that a full scan per query is fine.

use super::{
    cosine_distance, rank_hits, EmbeddingRecord, IndexHit, MetadataFilter, ReportMetadata,
    VectorStore,
};
use crate::error::{Result, WrenchError};
use async_trait::async_trait;
use rusqlite::{params, Connection, OpenFlags};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS report_embeddings (
    id TEXT PRIMARY KEY,
    document TEXT NOT NULL,
    model TEXT,
    serial TEXT,
    date TEXT,
    service_report_id TEXT NOT NULL,
    embedding BLOB NOT NULL,
    indexed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_report_embeddings_serial ON report_embeddings(serial);
"#;

/// Shared WHERE clause for metadata filters. `?1` is the escaped model substring, `?2` the serial.
const FILTER_CLAUSE: &str =
    r"(?1 IS NULL OR model LIKE '%' || ?1 || '%' ESCAPE '\') AND (?2 IS NULL OR serial = ?2)";

/// Escape `LIKE` wildcards so the model needle matches literally.
fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Create a new SQLite vector store.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an existing index file without creating or migrating anything.
    ///
    /// Writes through this handle fail; use it for inspection only.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite vector store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| WrenchError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn upsert_batch(&self, records: &[EmbeddingRecord]) -> Result<usize> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        for record in records {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO report_embeddings
                (id, document, model, serial, date, service_report_id, embedding, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    record.id,
                    record.document,
                    record.metadata.model,
                    record.metadata.serial,
                    record.metadata.date,
                    record.metadata.service_report_id,
                    Self::embedding_to_bytes(&record.embedding),
                    record.indexed_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        debug!("Batch upserted {} records", records.len());
        Ok(records.len())
    }

    #[instrument(skip(self, query_embedding))]
    async fn query(
        &self,
        query_embedding: &[f32],
        limit: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<IndexHit>> {
        let conn = self.conn()?;

        let sql = format!(
            "SELECT id, document, model, serial, date, service_report_id, embedding \
             FROM report_embeddings WHERE {}",
            FILTER_CLAUSE
        );
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt.query_map(params![filter.model.as_deref().map(escape_like), filter.serial], |row| {
            let embedding_bytes: Vec<u8> = row.get(6)?;
            Ok(IndexHit {
                id: row.get(0)?,
                distance: cosine_distance(
                    query_embedding,
                    &Self::bytes_to_embedding(&embedding_bytes),
                ),
                document: row.get(1)?,
                metadata: ReportMetadata {
                    model: row.get(2)?,
                    serial: row.get(3)?,
                    date: row.get(4)?,
                    service_report_id: row.get(5)?,
                },
            })
        })?;

        let hits = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        let hits = rank_hits(hits, limit);

        debug!("Found {} matching records", hits.len());
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM report_embeddings", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    #[instrument(skip(self))]
    async fn delete(&self, filter: &MetadataFilter) -> Result<usize> {
        let conn = self.conn()?;
        let sql = format!("DELETE FROM report_embeddings WHERE {}", FILTER_CLAUSE);
        let deleted = conn.execute(
            &sql,
            params![filter.model.as_deref().map(escape_like), filter.serial],
        )?;

        info!("Deleted {} records from the vector store", deleted);
        Ok(deleted)
    }
}
