#![forbid(unsafe_code)]

//! Ingestion and indexing engine for threaded mailing-list archives.
//!
//! [`Engine`] owns the single writer thread, the reader connection and the
//! event sink. Batches are split into chunks, queued, and applied one at a
//! time; lookups go straight to the reader.

mod batch;
mod config;
mod engine;
mod error;
pub mod events;
pub mod protocol;
pub mod queue;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::EngineError;
pub use events::{Event, EventSink};
pub use protocol::{MessageView, Request, UpsertMessageItem};
pub use queue::{JobOutcome, QueueState, WriteQueue};

pub use la_storage::{CURRENT_SCHEMA_VERSION, DEFAULT_SEARCH_LIMIT};
