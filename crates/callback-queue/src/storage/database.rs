//! SQLite queue store
//!
//! Owns the `queue` table and every row-level mutation on it. Claims run inside an
//! immediate transaction, so two callers (threads, coordinators or processes sharing
//! the database file) can never claim the same row.

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{JobRecord, JobStatus, NewJob, QueueStats};

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const JOB_COLUMNS: &str =
    "id, timestamp, callback_url, file, status, attempts, error_message, metadata, processed_at";

/// Failure detail stored when a job is failed without a message
const UNKNOWN_FAILURE: &str = "processing failed";

/// Where the backing database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    /// A database file, created on first open
    File(PathBuf),
    /// A private in-memory database. Closing it discards all rows.
    Memory,
}

/// SQLite-based queue store
pub struct QueueDb {
    location: DbLocation,
    busy_timeout: Duration,
    conn: Mutex<Option<Connection>>,
}

impl QueueDb {
    /// Create a store for the database file at `path`. Nothing is opened until [`initialize`].
    ///
    /// [`initialize`]: QueueDb::initialize
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            location: DbLocation::File(path.as_ref().to_path_buf()),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            conn: Mutex::new(None),
        }
    }

    /// Create a store backed by a private in-memory database
    pub fn in_memory() -> Self {
        Self {
            location: DbLocation::Memory,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            conn: Mutex::new(None),
        }
    }

    /// Create and initialize a file-backed store
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Self::new(path);
        db.initialize()?;
        Ok(db)
    }

    /// Create and initialize an in-memory store
    pub fn open_in_memory() -> Result<Self> {
        let db = Self::in_memory();
        db.initialize()?;
        Ok(db)
    }

    /// Set how long a connection waits on a database locked by another connection
    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn location(&self) -> &DbLocation {
        &self.location
    }

    /// Whether the store has an open connection
    pub fn is_initialized(&self) -> bool {
        self.conn.lock().is_some()
    }

    /// Open the backing database (if not already open) and ensure the schema exists.
    ///
    /// Safe to call any number of times.
    pub fn initialize(&self) -> Result<()> {
        let mut guard = self.conn.lock();

        if guard.is_none() {
            let conn = self.connect()?;
            *guard = Some(conn);
            tracing::info!("Queue store opened ({:?})", self.location);
        }

        match guard.as_ref() {
            Some(conn) => migrate(conn),
            None => Err(Error::store_unavailable("queue store failed to open")),
        }
    }

    fn connect(&self) -> Result<Connection> {
        let conn = match &self.location {
            DbLocation::File(path) => Connection::open(path).map_err(|e| {
                Error::StoreUnavailable(format!("Failed to open database {}: {}", path.display(), e))
            })?,
            DbLocation::Memory => Connection::open_in_memory().map_err(|e| {
                Error::StoreUnavailable(format!("Failed to open in-memory database: {}", e))
            })?,
        };

        conn.busy_timeout(self.busy_timeout)
            .map_err(|e| Error::StoreUnavailable(format!("Failed to set busy timeout: {}", e)))?;

        if matches!(self.location, DbLocation::File(_)) {
            conn.execute_batch(
                r#"
                PRAGMA journal_mode=WAL;
                PRAGMA synchronous=NORMAL;
            "#,
            )
            .map_err(|e| Error::StoreUnavailable(format!("Failed to set pragmas: {}", e)))?;
        }

        Ok(conn)
    }

    /// Release the backing connection. Later operations fail with `StoreUnavailable`
    /// until [`initialize`] is called again.
    ///
    /// [`initialize`]: QueueDb::initialize
    pub fn close(&self) -> Result<()> {
        let conn = self.conn.lock().take();
        if let Some(conn) = conn {
            conn.close()
                .map_err(|(_, e)| Error::Internal(format!("Failed to close database: {}", e)))?;
            tracing::info!("Queue store closed");
        }
        Ok(())
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.conn.lock();
        let conn = guard
            .as_mut()
            .ok_or_else(|| Error::store_unavailable("queue store is not initialized"))?;
        f(conn)
    }

    // ==================== Mutations ====================

    /// Insert a new pending job. Returns the assigned id.
    pub fn enqueue(&self, job: &NewJob) -> Result<i64> {
        self.insert(job).map(|record| record.id)
    }

    /// Insert a new pending job. Returns the record as written.
    pub fn insert(&self, job: &NewJob) -> Result<JobRecord> {
        self.insert_at(job, Utc::now().timestamp_millis())
    }

    pub(crate) fn enqueue_at(&self, job: &NewJob, timestamp: i64) -> Result<i64> {
        self.insert_at(job, timestamp).map(|record| record.id)
    }

    fn insert_at(&self, job: &NewJob, timestamp: i64) -> Result<JobRecord> {
        let metadata = job.validate()?;

        let id = self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO queue (timestamp, callback_url, file, status, attempts, metadata)
                VALUES (?1, ?2, ?3, 'pending', 0, ?4)
                "#,
                params![timestamp, job.callback_url, job.file, metadata],
            )
            .map_err(|e| Error::Internal(format!("Failed to enqueue job: {}", e)))?;

            Ok(conn.last_insert_rowid())
        })?;

        Ok(JobRecord {
            id,
            timestamp,
            callback_url: job.callback_url.clone(),
            file: job.file.clone(),
            status: JobStatus::Pending,
            attempts: 0,
            error_message: None,
            metadata: job.metadata.clone(),
            processed_at: None,
        })
    }

    /// Atomically claim the oldest pending job.
    ///
    /// The oldest row by `timestamp` (ties broken by `id`) moves to `processing` and its
    /// `attempts` counter is incremented. Returns `None` when nothing is pending.
    pub fn claim_next(&self) -> Result<Option<JobRecord>> {
        self.with_conn(|conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|e| Error::Internal(format!("Failed to begin claim: {}", e)))?;

            let job = tx
                .query_row(
                    &format!(
                        "SELECT {} FROM queue WHERE status = 'pending' \
                         ORDER BY timestamp ASC, id ASC LIMIT 1",
                        JOB_COLUMNS
                    ),
                    [],
                    row_to_job_record,
                )
                .optional()
                .map_err(|e| Error::Internal(format!("Failed to select pending job: {}", e)))?;

            // Dropping the transaction rolls it back
            let Some(mut job) = job else {
                return Ok(None);
            };

            tx.execute(
                r#"
                UPDATE queue
                SET status = 'processing', attempts = attempts + 1
                WHERE id = ?1 AND status = 'pending'
                "#,
                params![job.id],
            )
            .map_err(|e| Error::Internal(format!("Failed to claim job {}: {}", job.id, e)))?;

            tx.commit()
                .map_err(|e| Error::Internal(format!("Failed to commit claim: {}", e)))?;

            job.status = JobStatus::Processing;
            job.attempts += 1;
            Ok(Some(job))
        })
    }

    /// Move a `processing` job to a terminal state and stamp `processed_at`.
    ///
    /// `error_message` is stored only for `failed`; completing a job clears it.
    pub fn finalize(
        &self,
        id: i64,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<JobRecord> {
        if !status.is_terminal() {
            return Err(Error::invalid_transition(id, None, status));
        }

        let error_message = match status {
            JobStatus::Failed => Some(
                error_message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or(UNKNOWN_FAILURE)
                    .to_string(),
            ),
            _ => None,
        };

        self.with_conn(|conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|e| Error::Internal(format!("Failed to begin finalize: {}", e)))?;

            let current = current_status(&tx, id)?.ok_or(Error::NotFound(id))?;
            if !current.can_transition_to(status) {
                return Err(Error::invalid_transition(id, Some(current), status));
            }

            tx.execute(
                r#"
                UPDATE queue
                SET status = ?2, error_message = ?3, processed_at = ?4
                WHERE id = ?1
                "#,
                params![id, status.as_str(), error_message, Utc::now().timestamp_millis()],
            )
            .map_err(|e| Error::Internal(format!("Failed to finalize job {}: {}", id, e)))?;

            let job = select_job(&tx, id)?.ok_or(Error::NotFound(id))?;

            tx.commit()
                .map_err(|e| Error::Internal(format!("Failed to commit finalize: {}", e)))?;

            Ok(job)
        })
    }

    /// Return failed jobs with `attempts < max_attempts` to `pending`.
    ///
    /// `attempts` is left untouched; `processed_at` and `error_message` are cleared.
    /// Returns the number of jobs moved.
    pub fn retry_failed(&self, max_attempts: u32) -> Result<usize> {
        self.with_conn(|conn| {
            let count = conn
                .execute(
                    r#"
                    UPDATE queue
                    SET status = 'pending', processed_at = NULL, error_message = NULL
                    WHERE status = 'failed' AND attempts < ?1
                    "#,
                    params![max_attempts],
                )
                .map_err(|e| Error::Internal(format!("Failed to retry failed jobs: {}", e)))?;

            Ok(count)
        })
    }

    /// Delete a job regardless of its state
    pub fn remove(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| {
            let count = conn
                .execute("DELETE FROM queue WHERE id = ?1", params![id])
                .map_err(|e| Error::Internal(format!("Failed to remove job {}: {}", id, e)))?;

            if count == 0 {
                return Err(Error::NotFound(id));
            }
            Ok(())
        })
    }

    // ==================== Queries ====================

    /// Get a job by id
    pub fn get(&self, id: i64) -> Result<Option<JobRecord>> {
        self.with_conn(|conn| select_job(conn, id))
    }

    /// All jobs with the given status, oldest first
    pub fn list_by_status(&self, status: JobStatus) -> Result<Vec<JobRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM queue WHERE status = ?1 ORDER BY timestamp ASC, id ASC",
                    JOB_COLUMNS
                ))
                .map_err(|e| Error::Internal(format!("Failed to prepare query: {}", e)))?;

            let jobs = stmt
                .query_map(params![status.as_str()], row_to_job_record)
                .map_err(|e| Error::Internal(format!("Failed to list jobs: {}", e)))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| Error::Internal(format!("Failed to read job row: {}", e)))?;

            Ok(jobs)
        })
    }

    /// All jobs, oldest first
    pub fn list_all(&self) -> Result<Vec<JobRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM queue ORDER BY timestamp ASC, id ASC",
                    JOB_COLUMNS
                ))
                .map_err(|e| Error::Internal(format!("Failed to prepare query: {}", e)))?;

            let jobs = stmt
                .query_map([], row_to_job_record)
                .map_err(|e| Error::Internal(format!("Failed to list jobs: {}", e)))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| Error::Internal(format!("Failed to read job row: {}", e)))?;

            Ok(jobs)
        })
    }

    /// Count jobs per status
    pub fn stats(&self) -> Result<QueueStats> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT status, COUNT(*) FROM queue GROUP BY status")
                .map_err(|e| Error::Internal(format!("Failed to prepare query: {}", e)))?;

            let counts = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
                .map_err(|e| Error::Internal(format!("Failed to count jobs: {}", e)))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| Error::Internal(format!("Failed to read count row: {}", e)))?;

            let mut stats = QueueStats::default();
            for (status, count) in counts {
                let count = count as usize;
                match status.parse::<JobStatus>()? {
                    JobStatus::Pending => stats.pending = count,
                    JobStatus::Processing => stats.processing = count,
                    JobStatus::Completed => stats.completed = count,
                    JobStatus::Failed => stats.failed = count,
                }
                stats.total += count;
            }

            Ok(stats)
        })
    }
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS queue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp INTEGER NOT NULL,
            callback_url TEXT NOT NULL,
            file TEXT NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('pending', 'processing', 'completed', 'failed')),
            attempts INTEGER DEFAULT 0,
            error_message TEXT,
            metadata TEXT,
            processed_at INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_queue_status ON queue(status);
        CREATE INDEX IF NOT EXISTS idx_queue_timestamp ON queue(timestamp);
    "#,
    )
    .map_err(|e| Error::Internal(format!("Failed to run migrations: {}", e)))?;

    tracing::debug!("Queue schema ready");
    Ok(())
}

fn current_status(conn: &Connection, id: i64) -> Result<Option<JobStatus>> {
    let status: Option<String> = conn
        .query_row("SELECT status FROM queue WHERE id = ?1", params![id], |row| row.get(0))
        .optional()
        .map_err(|e| Error::Internal(format!("Failed to read status of job {}: {}", id, e)))?;

    status.map(|s| s.parse()).transpose()
}

fn select_job(conn: &Connection, id: i64) -> Result<Option<JobRecord>> {
    conn.query_row(
        &format!("SELECT {} FROM queue WHERE id = ?1", JOB_COLUMNS),
        params![id],
        row_to_job_record,
    )
    .optional()
    .map_err(|e| Error::Internal(format!("Failed to get job {}: {}", id, e)))
}

fn row_to_job_record(row: &rusqlite::Row) -> rusqlite::Result<JobRecord> {
    let id: i64 = row.get(0)?;
    let timestamp: i64 = row.get(1)?;
    let callback_url: String = row.get(2)?;
    let file: String = row.get(3)?;
    let status_str: String = row.get(4)?;
    let attempts: Option<u32> = row.get(5)?;
    let error_message: Option<String> = row.get(6)?;
    let metadata_json: Option<String> = row.get(7)?;
    let processed_at: Option<i64> = row.get(8)?;

    let status = status_str
        .parse::<JobStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    let metadata = metadata_json
        .map(|j| serde_json::from_str(&j))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;

    Ok(JobRecord {
        id,
        timestamp,
        callback_url,
        file,
        status,
        attempts: attempts.unwrap_or(0),
        error_message,
        metadata,
        processed_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    fn job(file: &str) -> NewJob {
        NewJob::new("http://x/cb", file)
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let db = QueueDb::in_memory();
        assert_eq!(db.location(), &DbLocation::Memory);
        assert!(!db.is_initialized());

        db.initialize().unwrap();
        let id = db.enqueue(&job("a.pdf")).unwrap();
        db.initialize().unwrap();

        assert!(db.is_initialized());
        assert!(db.get(id).unwrap().is_some());
    }

    #[test]
    fn test_initialize_fails_for_unreachable_path() {
        let dir = tempfile::tempdir().unwrap();
        let db = QueueDb::new(dir.path().join("missing").join("queue.db"));
        assert!(matches!(db.initialize(), Err(Error::StoreUnavailable(_))));
    }

    #[test]
    fn test_operations_require_initialize() {
        let db = QueueDb::in_memory();
        assert!(matches!(db.enqueue(&job("a.pdf")), Err(Error::StoreUnavailable(_))));
        assert!(matches!(db.claim_next(), Err(Error::StoreUnavailable(_))));
        assert!(matches!(db.list_all(), Err(Error::StoreUnavailable(_))));
    }

    #[test]
    fn test_close_makes_store_unavailable() {
        let db = QueueDb::open_in_memory().unwrap();
        db.close().unwrap();
        db.close().unwrap();

        assert!(!db.is_initialized());
        assert!(matches!(db.enqueue(&job("a.pdf")), Err(Error::StoreUnavailable(_))));
        assert!(matches!(db.retry_failed(3), Err(Error::StoreUnavailable(_))));
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.db");

        let db = QueueDb::open(&path).unwrap();
        assert_eq!(db.location(), &DbLocation::File(path.clone()));
        let id = db.enqueue(&job("a.pdf")).unwrap();
        db.close().unwrap();
        db.initialize().unwrap();

        let stored = db.get(id).unwrap().unwrap();
        assert_eq!(stored.file, "a.pdf");
        assert_eq!(stored.status, JobStatus::Pending);
    }

    #[test]
    fn test_enqueue_creates_pending_record() {
        let db = QueueDb::open_in_memory().unwrap();
        let before = Utc::now().timestamp_millis();
        let id = db
            .enqueue(&job("a.pdf").with_metadata(json!({ "project": "p1" })))
            .unwrap();

        let stored = db.get(id).unwrap().unwrap();
        assert_eq!(stored.id, id);
        assert_eq!(stored.status, JobStatus::Pending);
        assert_eq!(stored.attempts, 0);
        assert_eq!(stored.callback_url, "http://x/cb");
        assert_eq!(stored.metadata, Some(json!({ "project": "p1" })));
        assert!(stored.timestamp >= before);
        assert!(stored.error_message.is_none());
        assert!(stored.processed_at.is_none());
    }

    #[test]
    fn test_enqueue_ids_increase() {
        let db = QueueDb::open_in_memory().unwrap();
        let a = db.enqueue(&job("a.pdf")).unwrap();
        let b = db.enqueue(&job("b.pdf")).unwrap();
        assert!(b > a);
    }

    #[test]
    fn test_enqueue_rejects_invalid_job() {
        let db = QueueDb::open_in_memory().unwrap();
        assert!(matches!(db.enqueue(&job("")), Err(Error::InvalidInput(_))));
        assert!(db.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_claim_on_empty_store_returns_none() {
        let db = QueueDb::open_in_memory().unwrap();
        assert!(db.claim_next().unwrap().is_none());
    }

    #[test]
    fn test_claim_returns_oldest_first() {
        let db = QueueDb::open_in_memory().unwrap();
        let a = db.enqueue(&job("a.pdf")).unwrap();
        thread::sleep(Duration::from_millis(1));
        let b = db.enqueue(&job("b.pdf")).unwrap();

        let first = db.claim_next().unwrap().unwrap();
        assert_eq!(first.id, a);
        assert_eq!(first.file, "a.pdf");
        assert_eq!(first.status, JobStatus::Processing);
        assert_eq!(first.attempts, 1);

        let second = db.claim_next().unwrap().unwrap();
        assert_eq!(second.id, b);
        assert!(db.claim_next().unwrap().is_none());
    }

    #[test]
    fn test_claim_orders_by_timestamp_then_id() {
        let db = QueueDb::open_in_memory().unwrap();
        let late = db.enqueue_at(&job("late.pdf"), 2_000).unwrap();
        let tie_a = db.enqueue_at(&job("tie-a.pdf"), 1_000).unwrap();
        let tie_b = db.enqueue_at(&job("tie-b.pdf"), 1_000).unwrap();

        let order: Vec<i64> = std::iter::from_fn(|| db.claim_next().unwrap())
            .map(|j| j.id)
            .collect();
        assert_eq!(order, vec![tie_a, tie_b, late]);
    }

    #[test]
    fn test_claim_persists_processing_state() {
        let db = QueueDb::open_in_memory().unwrap();
        let id = db.enqueue(&job("a.pdf")).unwrap();
        db.claim_next().unwrap();

        let stored = db.get(id).unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Processing);
        assert_eq!(stored.attempts, 1);
        assert!(stored.processed_at.is_none());
    }

    #[test]
    fn test_concurrent_claims_never_duplicate() {
        let db = Arc::new(QueueDb::open_in_memory().unwrap());
        for i in 0..5 {
            db.enqueue(&job(&format!("{}.pdf", i))).unwrap();
        }

        let handles: Vec<_> = (0..12)
            .map(|_| {
                let db = Arc::clone(&db);
                thread::spawn(move || db.claim_next().unwrap().map(|j| j.id))
            })
            .collect();

        let claimed: Vec<i64> = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .collect();
        let distinct: HashSet<i64> = claimed.iter().copied().collect();

        assert_eq!(claimed.len(), 5);
        assert_eq!(distinct.len(), 5);
    }

    #[test]
    fn test_claims_across_connections_never_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.db");

        let seed = QueueDb::open(&path).unwrap();
        for i in 0..40 {
            seed.enqueue(&job(&format!("{}.pdf", i))).unwrap();
        }

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let path = path.clone();
                thread::spawn(move || {
                    let db = QueueDb::open(&path).unwrap();
                    let mut ids = Vec::new();
                    while let Some(job) = db.claim_next().unwrap() {
                        ids.push(job.id);
                    }
                    ids
                })
            })
            .collect();

        let claimed: Vec<i64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let distinct: HashSet<i64> = claimed.iter().copied().collect();

        assert_eq!(claimed.len(), 40);
        assert_eq!(distinct.len(), 40);
        assert_eq!(seed.stats().unwrap().processing, 40);
    }

    #[test]
    fn test_finalize_completed() {
        let db = QueueDb::open_in_memory().unwrap();
        let id = db.enqueue(&job("a.pdf")).unwrap();
        db.claim_next().unwrap();

        let done = db.finalize(id, JobStatus::Completed, Some("ignored")).unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert!(done.processed_at.is_some());
        assert!(done.error_message.is_none());
    }

    #[test]
    fn test_finalize_failed_stores_message() {
        let db = QueueDb::open_in_memory().unwrap();
        let id = db.enqueue(&job("a.pdf")).unwrap();
        db.claim_next().unwrap();

        let failed = db.finalize(id, JobStatus::Failed, Some("callback refused")).unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("callback refused"));
        assert!(failed.processed_at.is_some());
    }

    #[test]
    fn test_finalize_failed_without_message_gets_default() {
        let db = QueueDb::open_in_memory().unwrap();
        let id = db.enqueue(&job("a.pdf")).unwrap();
        db.claim_next().unwrap();

        let failed = db.finalize(id, JobStatus::Failed, None).unwrap();
        assert_eq!(failed.error_message.as_deref(), Some(UNKNOWN_FAILURE));
    }

    #[test]
    fn test_finalize_unknown_id_is_not_found() {
        let db = QueueDb::open_in_memory().unwrap();
        assert!(matches!(
            db.finalize(99, JobStatus::Completed, None),
            Err(Error::NotFound(99))
        ));
    }

    #[test]
    fn test_finalize_rejects_non_terminal_status() {
        let db = QueueDb::open_in_memory().unwrap();
        let id = db.enqueue(&job("a.pdf")).unwrap();
        db.claim_next().unwrap();

        for status in [JobStatus::Processing, JobStatus::Pending] {
            assert!(matches!(
                db.finalize(id, status, None),
                Err(Error::InvalidTransition { .. })
            ));
        }
        assert_eq!(db.get(id).unwrap().unwrap().status, JobStatus::Processing);
    }

    #[test]
    fn test_finalize_requires_processing() {
        let db = QueueDb::open_in_memory().unwrap();
        let id = db.enqueue(&job("a.pdf")).unwrap();

        // pending -> completed skips the claim
        assert!(matches!(
            db.finalize(id, JobStatus::Completed, None),
            Err(Error::InvalidTransition { current: Some(JobStatus::Pending), .. })
        ));

        db.claim_next().unwrap();
        db.finalize(id, JobStatus::Completed, None).unwrap();

        // terminal states are final
        assert!(matches!(
            db.finalize(id, JobStatus::Failed, Some("late")),
            Err(Error::InvalidTransition { current: Some(JobStatus::Completed), .. })
        ));
    }

    #[test]
    fn test_retry_failed_respects_max_attempts() {
        let db = QueueDb::open_in_memory().unwrap();
        let id = db.enqueue(&job("a.pdf")).unwrap();

        db.claim_next().unwrap();
        db.finalize(id, JobStatus::Failed, Some("first")).unwrap();

        assert_eq!(db.retry_failed(2).unwrap(), 1);
        let retried = db.get(id).unwrap().unwrap();
        assert_eq!(retried.status, JobStatus::Pending);
        assert_eq!(retried.attempts, 1);
        assert!(retried.processed_at.is_none());
        assert!(retried.error_message.is_none());

        let reclaimed = db.claim_next().unwrap().unwrap();
        assert_eq!(reclaimed.id, id);
        assert_eq!(reclaimed.attempts, 2);
        db.finalize(id, JobStatus::Failed, Some("second")).unwrap();

        assert_eq!(db.retry_failed(2).unwrap(), 0);
        let exhausted = db.get(id).unwrap().unwrap();
        assert_eq!(exhausted.status, JobStatus::Failed);
        assert_eq!(exhausted.error_message.as_deref(), Some("second"));
        assert!(exhausted.processed_at.is_some());
    }

    #[test]
    fn test_retry_ignores_other_states() {
        let db = QueueDb::open_in_memory().unwrap();
        let done = db.enqueue_at(&job("done.pdf"), 1).unwrap();
        let running = db.enqueue_at(&job("running.pdf"), 2).unwrap();
        let waiting = db.enqueue_at(&job("waiting.pdf"), 3).unwrap();

        db.claim_next().unwrap();
        db.finalize(done, JobStatus::Completed, None).unwrap();
        db.claim_next().unwrap();

        assert_eq!(db.retry_failed(10).unwrap(), 0);
        assert_eq!(db.get(done).unwrap().unwrap().status, JobStatus::Completed);
        assert_eq!(db.get(running).unwrap().unwrap().status, JobStatus::Processing);
        assert_eq!(db.get(waiting).unwrap().unwrap().status, JobStatus::Pending);
    }

    #[test]
    fn test_list_by_status_returns_all_matches() {
        let db = QueueDb::open_in_memory().unwrap();
        let a = db.enqueue_at(&job("a.pdf"), 10).unwrap();
        let b = db.enqueue_at(&job("b.pdf"), 20).unwrap();
        let c = db.enqueue_at(&job("c.pdf"), 30).unwrap();
        db.claim_next().unwrap();

        let pending: Vec<i64> = db
            .list_by_status(JobStatus::Pending)
            .unwrap()
            .iter()
            .map(|j| j.id)
            .collect();
        assert_eq!(pending, vec![b, c]);

        let processing = db.list_by_status(JobStatus::Processing).unwrap();
        assert_eq!(processing.len(), 1);
        assert_eq!(processing[0].id, a);
        assert!(db.list_by_status(JobStatus::Failed).unwrap().is_empty());
    }

    #[test]
    fn test_list_all_is_fifo() {
        let db = QueueDb::open_in_memory().unwrap();
        let late = db.enqueue_at(&job("late.pdf"), 50).unwrap();
        let early = db.enqueue_at(&job("early.pdf"), 5).unwrap();

        let ids: Vec<i64> = db.list_all().unwrap().iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![early, late]);
    }

    #[test]
    fn test_remove() {
        let db = QueueDb::open_in_memory().unwrap();
        let id = db.enqueue(&job("a.pdf")).unwrap();

        db.remove(id).unwrap();
        assert!(db.get(id).unwrap().is_none());
        assert!(matches!(db.remove(id), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_stats() {
        let db = QueueDb::open_in_memory().unwrap();
        for name in ["a.pdf", "b.pdf", "c.pdf"] {
            db.enqueue(&job(name)).unwrap();
        }
        let first = db.claim_next().unwrap().unwrap();
        db.finalize(first.id, JobStatus::Failed, Some("boom")).unwrap();
        db.claim_next().unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.processing, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.completed, 0);
    }

    #[test]
    fn test_schema_rejects_unknown_status() {
        let db = QueueDb::open_in_memory().unwrap();
        let result = db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO queue (timestamp, callback_url, file, status) VALUES (1, 'u', 'f', 'running')",
                [],
            )
            .map_err(|e| Error::Internal(e.to_string()))
        });
        assert!(result.is_err());
    }
}
