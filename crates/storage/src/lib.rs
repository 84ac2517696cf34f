#![forbid(unsafe_code)]

//! SQLite storage for the archive engine.
//!
//! One `SqliteStore` wraps one connection. The engine opens two of them on the
//! same database file: a writer that only the write queue touches, and a reader
//! for lookups. WAL journaling lets the reader run while a chunk is being
//! written.

mod error;
mod query;
mod schema;
mod write;

pub use error::StoreError;
pub use query::DEFAULT_SEARCH_LIMIT;
pub use schema::{CURRENT_SCHEMA_VERSION, MetaRow, SchemaReport};

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_DB_FILE_NAME: &str = "listarchive.db";

#[derive(Clone, Debug)]
pub struct StoreOptions {
    pub db_file_name: String,
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            db_file_name: DEFAULT_DB_FILE_NAME.to_string(),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    db_path: PathBuf,
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>, options: &StoreOptions) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref();
        std::fs::create_dir_all(storage_dir)?;
        if options.db_file_name.trim().is_empty() {
            return Err(StoreError::InvalidInput("db_file_name must not be empty"));
        }

        let db_path = storage_dir.join(&options.db_file_name);
        let conn = Connection::open(&db_path)?;
        conn.busy_timeout(options.busy_timeout)?;
        let journal_mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        if !journal_mode.eq_ignore_ascii_case("wal") {
            tracing::warn!(journal_mode, "sqlite refused WAL journaling; reads may wait on writes");
        }
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        Ok(Self { conn, db_path })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

pub(crate) fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration,
        Err(_) => return 0,
    };

    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}

pub(crate) fn placeholders(count: usize) -> String {
    (0..count).map(|_| "?").collect::<Vec<_>>().join(",")
}
