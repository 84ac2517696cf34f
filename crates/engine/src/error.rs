#![forbid(unsafe_code)]

use la_storage::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("initialization failed: {0}")]
    Init(String),
    #[error("invalid date {value:?}: {reason}")]
    InvalidDate { value: String, reason: String },
    #[error("write queue is shut down")]
    ShutDown,
    #[error("failed to spawn writer thread: {0}")]
    WriterSpawn(std::io::Error),
}

impl EngineError {
    /// Stable machine-readable code; storage errors keep their own.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Store(err) => err.code(),
            Self::Init(_) => "INIT_FAILED",
            Self::InvalidDate { .. } => "INVALID_DATE",
            Self::ShutDown => "SHUT_DOWN",
            Self::WriterSpawn(_) => "WRITER_SPAWN",
        }
    }

    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Store(err) => err.is_fatal(),
            Self::Init(_) | Self::WriterSpawn(_) => true,
            Self::InvalidDate { .. } | Self::ShutDown => false,
        }
    }
}
