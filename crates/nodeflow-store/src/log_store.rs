use std::path::Path;
use std::sync::Mutex;

use futures::future::BoxFuture;
use rusqlite::{params, Connection};
use tracing::debug;

use nodeflow_core::error::{NodeflowError, Result};
use nodeflow_core::traits::ExecutionLogStore;
use nodeflow_core::types::ExecutionLogEntry;

pub const DEFAULT_MAX_LOG_ENTRIES: usize = 1000;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS execution_logs (
        id TEXT PRIMARY KEY,
        workflow_id TEXT NOT NULL,
        timestamp_ms INTEGER NOT NULL,
        entry_json TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_logs_workflow
        ON execution_logs(workflow_id, timestamp_ms DESC);

    CREATE INDEX IF NOT EXISTS idx_logs_timestamp
        ON execution_logs(timestamp_ms DESC);";

fn db_err(e: impl std::fmt::Display) -> NodeflowError {
    NodeflowError::Database(e.to_string())
}

/// Durable execution log backed by SQLite.
///
/// Each entry is stored as JSON next to its workflow id and millisecond
/// timestamp. Insert and trim run in one transaction under the connection
/// mutex, so concurrent appends never leave more than `max_entries` rows.
pub struct SqliteLogStore {
    conn: Mutex<Connection>,
    max_entries: usize,
}

impl SqliteLogStore {
    /// Open or create the log database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    NodeflowError::Database(format!("Failed to create db directory: {}", e))
                })?;
            }
        }

        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;

        debug!(path = %path.display(), "Execution log store opened");
        Ok(Self {
            conn: Mutex::new(conn),
            max_entries: DEFAULT_MAX_LOG_ENTRIES,
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
            max_entries: DEFAULT_MAX_LOG_ENTRIES,
        })
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    fn query(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<ExecutionLogEntry>> {
        let conn = self.conn.lock().map_err(db_err)?;
        let mut stmt = conn.prepare(sql).map_err(db_err)?;
        let rows = stmt
            .query_map(args, |row| row.get::<_, String>(0))
            .map_err(db_err)?;

        let mut entries = Vec::new();
        for row in rows {
            let json = row.map_err(db_err)?;
            entries.push(serde_json::from_str(&json)?);
        }
        Ok(entries)
    }
}

impl ExecutionLogStore for SqliteLogStore {
    fn append(&self, entry: ExecutionLogEntry) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let json = serde_json::to_string(&entry)?;
            let mut conn = self.conn.lock().map_err(db_err)?;
            let tx = conn.transaction().map_err(db_err)?;

            tx.execute(
                "INSERT OR REPLACE INTO execution_logs (id, workflow_id, timestamp_ms, entry_json)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    entry.id,
                    entry.workflow_id,
                    entry.timestamp.timestamp_millis(),
                    json
                ],
            )
            .map_err(db_err)?;

            let trimmed = tx
                .execute(
                    "DELETE FROM execution_logs WHERE rowid NOT IN (
                         SELECT rowid FROM execution_logs
                         ORDER BY timestamp_ms DESC, rowid DESC
                         LIMIT ?1
                     )",
                    params![self.max_entries as i64],
                )
                .map_err(db_err)?;

            tx.commit().map_err(db_err)?;

            if trimmed > 0 {
                debug!(trimmed, "Trimmed old execution logs");
            }
            Ok(())
        })
    }

    fn list_all(&self) -> BoxFuture<'_, Result<Vec<ExecutionLogEntry>>> {
        Box::pin(async move {
            self.query(
                "SELECT entry_json FROM execution_logs ORDER BY timestamp_ms DESC, rowid DESC",
                &[],
            )
        })
    }

    fn list_for_workflow(&self, workflow_id: &str) -> BoxFuture<'_, Result<Vec<ExecutionLogEntry>>> {
        let workflow_id = workflow_id.to_string();
        Box::pin(async move {
            self.query(
                "SELECT entry_json FROM execution_logs WHERE workflow_id = ?1
                 ORDER BY timestamp_ms DESC, rowid DESC",
                &[&workflow_id],
            )
        })
    }

    fn get(&self, id: &str) -> BoxFuture<'_, Result<Option<ExecutionLogEntry>>> {
        let id = id.to_string();
        Box::pin(async move {
            let mut found = self.query("SELECT entry_json FROM execution_logs WHERE id = ?1", &[&id])?;
            Ok(found.pop())
        })
    }

    fn delete_for_workflow(&self, workflow_id: &str) -> BoxFuture<'_, Result<()>> {
        let workflow_id = workflow_id.to_string();
        Box::pin(async move {
            let conn = self.conn.lock().map_err(db_err)?;
            let deleted = conn
                .execute(
                    "DELETE FROM execution_logs WHERE workflow_id = ?1",
                    params![workflow_id],
                )
                .map_err(db_err)?;
            debug!(workflow_id = %workflow_id, deleted, "Deleted workflow execution logs");
            Ok(())
        })
    }
}

/// In-process execution log with the same ordering and cap as the SQLite store.
pub struct MemoryLogStore {
    entries: Mutex<Vec<ExecutionLogEntry>>,
    max_entries: usize,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_MAX_LOG_ENTRIES)
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            max_entries,
        }
    }

    fn snapshot(&self, filter: impl Fn(&ExecutionLogEntry) -> bool) -> Result<Vec<ExecutionLogEntry>> {
        let entries = self.entries.lock().map_err(db_err)?;
        Ok(entries.iter().filter(|e| filter(e)).cloned().collect())
    }
}

impl Default for MemoryLogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionLogStore for MemoryLogStore {
    fn append(&self, entry: ExecutionLogEntry) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut entries = self.entries.lock().map_err(db_err)?;
            entries.retain(|e| e.id != entry.id);
            // Newest insert first among equal timestamps; the sort is stable.
            entries.insert(0, entry);
            entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            entries.truncate(self.max_entries);
            Ok(())
        })
    }

    fn list_all(&self) -> BoxFuture<'_, Result<Vec<ExecutionLogEntry>>> {
        Box::pin(async move { self.snapshot(|_| true) })
    }

    fn list_for_workflow(&self, workflow_id: &str) -> BoxFuture<'_, Result<Vec<ExecutionLogEntry>>> {
        let workflow_id = workflow_id.to_string();
        Box::pin(async move { self.snapshot(|e| e.workflow_id == workflow_id) })
    }

    fn get(&self, id: &str) -> BoxFuture<'_, Result<Option<ExecutionLogEntry>>> {
        let id = id.to_string();
        Box::pin(async move { Ok(self.snapshot(|e| e.id == id)?.into_iter().next()) })
    }

    fn delete_for_workflow(&self, workflow_id: &str) -> BoxFuture<'_, Result<()>> {
        let workflow_id = workflow_id.to_string();
        Box::pin(async move {
            let mut entries = self.entries.lock().map_err(db_err)?;
            entries.retain(|e| e.workflow_id != workflow_id);
            Ok(())
        })
    }
}
