//! Durable queue backed by a SQLite database.
//!
//! Several named queues can live in one database file, and any number of processes
//! may open it at once. Each client holds its own connection.

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use super::{QueueError, QueueItem, WorkQueue};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS work_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    queue TEXT NOT NULL,
    item TEXT NOT NULL,
    pushed_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_work_queue_queue ON work_queue(queue, id);
";

/// Upper bound on waiting for another client's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteQueue {
    conn: Mutex<Connection>,
    name: String,
}

impl SqliteQueue {
    /// Open or create the queue database at `path`.
    pub fn open(path: &Path, name: &str) -> Result<Self, QueueError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = FULL;",
        )?;
        Self::with_connection(conn, name)
    }

    /// In-memory database, private to this client (for testing).
    pub fn in_memory(name: &str) -> Result<Self, QueueError> {
        Self::with_connection(Connection::open_in_memory()?, name)
    }

    fn with_connection(conn: Connection, name: &str) -> Result<Self, QueueError> {
        conn.execute_batch(SCHEMA)?;
        log::debug!("Opened work queue `{name}`");
        Ok(Self {
            conn: Mutex::new(conn),
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, QueueError> {
        self.conn
            .lock()
            .map_err(|_| QueueError::Poisoned(self.name.clone()))
    }
}

impl WorkQueue for SqliteQueue {
    fn push(&self, item: &QueueItem) -> Result<(), QueueError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO work_queue (queue, item) VALUES (?1, ?2)",
            params![self.name, item.as_str()],
        )?;
        Ok(())
    }

    fn pop(&self) -> Result<Option<QueueItem>, QueueError> {
        let mut conn = self.lock()?;
        // IMMEDIATE takes the write lock up front, so two clients can never both see
        // the same head row.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let head = tx
            .query_row(
                "SELECT id, item FROM work_queue WHERE queue = ?1 ORDER BY id DESC LIMIT 1",
                params![self.name],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        let Some((id, item)) = head else {
            tx.commit()?;
            return Ok(None);
        };
        tx.execute("DELETE FROM work_queue WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(Some(QueueItem::new(item)))
    }

    fn len(&self) -> Result<usize, QueueError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM work_queue WHERE queue = ?1",
            params![self.name],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
