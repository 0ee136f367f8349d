//! Paste record persistence with a uniqueness constraint on `paste_id`
//!
//! The store, not the pipeline, is the dedupe authority: the pipeline keeps no
//! memory across events, so redelivered or repeated identifiers are absorbed
//! here as [`InsertOutcome::Duplicate`].

use super::types::PasteRecord;
use async_trait::async_trait;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Stored,
    /// A record with the same identifier already exists; nothing was written
    Duplicate,
}

#[derive(Debug)]
pub enum StoreError {
    /// Backend cannot be reached or is locked; the loop backs off
    Unavailable(String),
    /// Write rejected for a reason other than a duplicate identifier
    Insert(String),
}

impl StoreError {
    fn from_sqlite(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(
                ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::CannotOpen
                | ErrorCode::SystemIoFailure
                | ErrorCode::DiskFull
                | ErrorCode::NotADatabase,
            ) => StoreError::Unavailable(err.to_string()),
            _ => StoreError::Insert(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::from_sqlite(err)
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(e) => write!(f, "Store unavailable: {}", e),
            StoreError::Insert(e) => write!(f, "Insert failed: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

/// Idempotent record insertion
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert(&self, record: &PasteRecord) -> Result<InsertOutcome, StoreError>;

    /// Backend name for logging
    fn backend_type(&self) -> &'static str;
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS pastes (
        paste_id TEXT NOT NULL UNIQUE,
        content TEXT NOT NULL,
        fetched_at INTEGER NOT NULL
    );
";

/// SQLite implementation of [`RecordStore`]
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    /// Open (or create) the database and apply the schema
    ///
    /// Schema setup is idempotent; failure here is fatal at startup.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Unavailable(format!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;

        log::info!("✅ SQLite paste store initialized: {}", db_path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Number of stored records
    pub fn count(&self) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM pastes", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Fetch a stored record by identifier
    pub fn get(&self, id: &str) -> Result<Option<PasteRecord>, StoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT paste_id, content, fetched_at FROM pastes WHERE paste_id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;

        Ok(row.map(|(id, content, fetched_at)| PasteRecord {
            id,
            content,
            fetched_at: chrono::DateTime::from_timestamp(fetched_at, 0).unwrap_or_default(),
        }))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection mutex poisoned".to_string()))
    }
}

fn insert_blocking(conn: &Connection, record: &PasteRecord) -> Result<InsertOutcome, StoreError> {
    let result = conn.execute(
        "INSERT INTO pastes (paste_id, content, fetched_at) VALUES (?1, ?2, ?3)",
        params![record.id, record.content, record.fetched_at.timestamp()],
    );

    match result {
        Ok(_) => Ok(InsertOutcome::Stored),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Ok(InsertOutcome::Duplicate)
        }
        Err(e) => Err(StoreError::from_sqlite(e)),
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn insert(&self, record: &PasteRecord) -> Result<InsertOutcome, StoreError> {
        let conn = Arc::clone(&self.conn);
        let record = record.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("connection mutex poisoned".to_string()))?;
            insert_blocking(&conn, &record)
        })
        .await
        .map_err(|e| StoreError::Insert(format!("insert task failed: {}", e)))?
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}
