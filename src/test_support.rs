//! Shared fixtures for unit tests.

use crate::embedding::Embedder;
use crate::error::{Result, WrenchError};
use crate::rag::{ChatTurn, Completer};
use crate::records::SqliteRecordStore;
use crate::vector_store::{EmbeddingRecord, IndexHit, MemoryVectorStore, MetadataFilter, VectorStore};
use async_trait::async_trait;
use rusqlite::Connection;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

pub const SCHEMA: &str = r#"
CREATE TABLE Machines (
    Serial TEXT PRIMARY KEY,
    Model TEXT,
    Install_Date TEXT
);

CREATE TABLE ServiceReports (
    ServiceReport_id INTEGER PRIMARY KEY,
    Serial TEXT REFERENCES Machines(Serial),
    Date TEXT,
    WorkRequired TEXT,
    ServicePerformed TEXT,
    VerificationTest TEXT,
    Failure_Type TEXT,
    ServiceType TEXT,
    Model TEXT
);

CREATE TABLE ServiceReportParts (
    ServiceReport_id INTEGER REFERENCES ServiceReports(ServiceReport_id),
    PartNumber TEXT,
    Description TEXT
);
"#;

const SEED: &str = r#"
INSERT INTO Machines VALUES ('1100001', 'VF-4', '2015-03-12');
INSERT INTO Machines VALUES ('1100002', 'VF-4SS', '2019-07-01');
INSERT INTO Machines VALUES ('2200001', 'ST-10', '2018-01-20');
INSERT INTO Machines VALUES ('3300001', 'UMC-750', '2021-05-05');

INSERT INTO ServiceReports VALUES (1, '1100001', '2023-01-10',
    'Spindle will not start, alarm 9953 spindle drive fault',
    'Replaced spindle drive fuse and reset drive',
    'Spindle ran 30 minutes at 8000 rpm', 'Electrical', 'Repair', 'VF-4');
INSERT INTO ServiceReports VALUES (2, '1100001', '2023-06-02',
    'Spindle will not start, alarm 9953 spindle drive fault',
    'Replaced spindle drive fuse and reset drive',
    'Ran warmup program', 'Electrical', 'Repair', 'VF-4');
INSERT INTO ServiceReports VALUES (3, '1100002', '2022-11-15',
    'Coolant pump not priming', 'Replaced coolant pump',
    'Coolant flow verified', 'Mechanical', 'Repair', 'VF-4SS');
INSERT INTO ServiceReports VALUES (4, '2200001', '2023-02-01',
    'Turret will not index', 'Adjusted turret clamp switch',
    'Indexed turret 50 times', 'Mechanical', 'Repair', 'ST-10');
INSERT INTO ServiceReports VALUES (5, '2200001', '2023-03-01',
    'ok', NULL, NULL, NULL, 'PM', NULL);

INSERT INTO ServiceReportParts VALUES (1, '93-1000', 'Spindle drive fuse');
INSERT INTO ServiceReportParts VALUES (1, '32-5000', 'Drive cable');
INSERT INTO ServiceReportParts VALUES (1, '20-0001', 'Spacer');
INSERT INTO ServiceReportParts VALUES (1, '20-0002', 'Washer');
INSERT INTO ServiceReportParts VALUES (2, '93-1000', 'Spindle drive fuse');
INSERT INTO ServiceReportParts VALUES (3, '93-2000', 'Coolant pump');
"#;

/// In-memory record store with four machines and five reports.
///
/// Report 5 renders to `Issue: ok`, below the default indexing threshold.
pub fn seeded_records() -> SqliteRecordStore {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(SCHEMA).unwrap();
    conn.execute_batch(SEED).unwrap();
    SqliteRecordStore::from_connection(conn)
}

/// Record store with the schema but no rows.
pub fn empty_records() -> SqliteRecordStore {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(SCHEMA).unwrap();
    SqliteRecordStore::from_connection(conn)
}

/// Run extra SQL against a fresh seeded store.
pub fn seeded_records_with(sql: &str) -> SqliteRecordStore {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(SCHEMA).unwrap();
    conn.execute_batch(SEED).unwrap();
    conn.execute_batch(sql).unwrap();
    SqliteRecordStore::from_connection(conn)
}

/// Deterministic bag-of-words embedder: each word bumps one hashed dimension.
pub struct HashEmbedder {
    dims: usize,
    fail_marker: Option<String>,
    pub calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self {
            dims: 64,
            fail_marker: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail any text containing `marker`; batches containing it fail as a whole.
    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_marker: Some(marker.to_lowercase()),
            ..Self::new()
        }
    }

    /// `embed` plus `embed_batch` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector(&self, text: &str) -> Result<Vec<f32>> {
        let lower = text.to_lowercase();
        if let Some(marker) = &self.fail_marker {
            if lower.contains(marker.as_str()) {
                return Err(WrenchError::Embedding(format!("refused: {}", marker)));
            }
        }

        let mut v = vec![0.0f32; self.dims];
        for word in lower.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let hash = word
                .bytes()
                .fold(0xcbf29ce484222325u64, |h, b| (h ^ b as u64).wrapping_mul(0x100000001b3));
            v[(hash % self.dims as u64) as usize] += 1.0;
        }
        Ok(v)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.vector(text)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        texts.iter().map(|t| self.vector(t)).collect()
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

/// Completer that replays a fixed answer or error and records every request.
pub struct ScriptedCompleter {
    reply: std::result::Result<String, String>,
    pub requests: Mutex<Vec<Vec<ChatTurn>>>,
}

impl ScriptedCompleter {
    pub fn answering(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Completer for ScriptedCompleter {
    async fn complete(&self, turns: &[ChatTurn]) -> Result<String> {
        self.requests.lock().unwrap().push(turns.to_vec());
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(message) => Err(WrenchError::Generation(message.clone())),
        }
    }
}

/// Memory store that counts upserts and can refuse deletes or every call.
pub struct CountingStore {
    inner: MemoryVectorStore,
    fail_delete: AtomicBool,
    unreachable: AtomicBool,
    pub upsert_calls: AtomicUsize,
    pub batch_sizes: Mutex<Vec<usize>>,
}

impl CountingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryVectorStore::new(),
            fail_delete: AtomicBool::new(false),
            unreachable: AtomicBool::new(false),
            upsert_calls: AtomicUsize::new(0),
            batch_sizes: Mutex::new(Vec::new()),
        }
    }

    pub fn refusing_deletes() -> Self {
        let store = Self::new();
        store.fail_delete.store(true, Ordering::SeqCst);
        store
    }

    /// Every operation fails as if the index server were down.
    pub fn unreachable() -> Self {
        let store = Self::new();
        store.unreachable.store(true, Ordering::SeqCst);
        store
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(WrenchError::VectorStore("connection refused".to_string()));
        }
        Ok(())
    }

    pub fn upserts(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorStore for CountingStore {
    async fn upsert_batch(&self, records: &[EmbeddingRecord]) -> Result<usize> {
        self.check_reachable()?;
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.batch_sizes.lock().unwrap().push(records.len());
        self.inner.upsert_batch(records).await
    }

    async fn query(
        &self,
        query_embedding: &[f32],
        limit: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<IndexHit>> {
        self.check_reachable()?;
        self.inner.query(query_embedding, limit, filter).await
    }

    async fn count(&self) -> Result<usize> {
        self.check_reachable()?;
        self.inner.count().await
    }

    async fn delete(&self, filter: &MetadataFilter) -> Result<usize> {
        self.check_reachable()?;
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(WrenchError::VectorStore("collection is read-only".to_string()));
        }
        self.inner.delete(filter).await
    }
}
