#![forbid(unsafe_code)]

use la_storage::{CURRENT_SCHEMA_VERSION, DEFAULT_DB_FILE_NAME, StoreOptions};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_BACKPRESSURE_THRESHOLD: usize = 10;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub storage_dir: PathBuf,
    pub db_file_name: String,
    /// Items per queued write job.
    pub chunk_size: usize,
    /// Pending-job depth above which every enqueue reports backpressure.
    pub backpressure_threshold: usize,
    pub schema_version: i64,
    pub busy_timeout: Duration,
}

impl EngineConfig {
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            db_file_name: DEFAULT_DB_FILE_NAME.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            backpressure_threshold: DEFAULT_BACKPRESSURE_THRESHOLD,
            schema_version: CURRENT_SCHEMA_VERSION,
            busy_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_backpressure_threshold(mut self, threshold: usize) -> Self {
        self.backpressure_threshold = threshold;
        self
    }

    pub fn with_schema_version(mut self, version: i64) -> Self {
        self.schema_version = version;
        self
    }

    pub fn with_db_file_name(mut self, name: impl Into<String>) -> Self {
        self.db_file_name = name.into();
        self
    }

    pub(crate) fn store_options(&self) -> StoreOptions {
        StoreOptions {
            db_file_name: self.db_file_name.clone(),
            busy_timeout: self.busy_timeout,
        }
    }
}
