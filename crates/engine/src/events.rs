#![forbid(unsafe_code)]

use crate::protocol::MessageView;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::Sender;

/// Label used for errors that cannot be tied to a source file.
pub const UNKNOWN_FILE: &str = "unknown";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Event {
    Progress {
        file: String,
        index: Option<u64>,
        inserted: usize,
        total: usize,
    },
    Done {
        file: String,
        index: Option<u64>,
        inserted_total: usize,
    },
    Error {
        file: String,
        index: Option<u64>,
        error: String,
    },
    Backpressure {
        level: usize,
    },
    Message {
        data: Option<MessageView>,
    },
    Thread {
        data: Vec<MessageView>,
    },
    SearchResults {
        data: Vec<MessageView>,
    },
}

impl Event {
    pub fn unknown_error(error: impl Into<String>) -> Self {
        Event::Error {
            file: UNKNOWN_FILE.to_string(),
            index: None,
            error: error.into(),
        }
    }
}

/// Destination for outbound events. Called from the writer thread as well as
/// from request handlers.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

impl<F> EventSink for F
where
    F: Fn(Event) + Send + Sync,
{
    fn emit(&self, event: Event) {
        self(event)
    }
}

impl EventSink for Sender<Event> {
    fn emit(&self, event: Event) {
        if self.send(event).is_err() {
            tracing::debug!("event receiver dropped");
        }
    }
}

/// Progress bookkeeping shared by every chunk job of one batch.
pub(crate) struct BatchReporter {
    sink: Arc<dyn EventSink>,
    file: String,
    index: Option<u64>,
    total: usize,
    inserted: AtomicUsize,
    done: AtomicBool,
}

impl BatchReporter {
    pub(crate) fn new(
        sink: Arc<dyn EventSink>,
        file: String,
        index: Option<u64>,
        total: usize,
    ) -> Self {
        Self {
            sink,
            file,
            index,
            total,
            inserted: AtomicUsize::new(0),
            done: AtomicBool::new(false),
        }
    }

    pub(crate) fn file(&self) -> &str {
        &self.file
    }

    pub(crate) fn chunk_applied(&self, count: usize) {
        let inserted = self.inserted.fetch_add(count, Ordering::SeqCst) + count;
        self.sink.emit(Event::Progress {
            file: self.file.clone(),
            index: self.index,
            inserted,
            total: self.total,
        });
        if inserted >= self.total {
            self.finish(inserted);
        }
    }

    pub(crate) fn empty_batch(&self) {
        self.finish(0);
    }

    pub(crate) fn chunk_failed(&self, error: String) {
        self.sink.emit(Event::Error {
            file: self.file.clone(),
            index: self.index,
            error,
        });
    }

    fn finish(&self, inserted_total: usize) {
        if self.done.swap(true, Ordering::SeqCst) {
            return;
        }
        self.sink.emit(Event::Done {
            file: self.file.clone(),
            index: self.index,
            inserted_total,
        });
    }
}
