#![forbid(unsafe_code)]

use crate::batch::chunk_jobs;
use crate::events::{BatchReporter, Event, EventSink};
use crate::protocol::{MessageView, Request, UpsertMessageItem};
use crate::queue::{QueueState, WriteQueue};
use crate::{EngineConfig, EngineError};
use la_core::Message;
use la_storage::{DEFAULT_SEARCH_LIMIT, SchemaReport, SqliteStore};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

const WRITER_THREAD_NAME: &str = "la-writer";

struct Ready {
    queue: WriteQueue<SqliteStore>,
    reader: Mutex<SqliteStore>,
    schema: SchemaReport,
}

impl Ready {
    fn reader(&self) -> MutexGuard<'_, SqliteStore> {
        self.reader.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Archive engine: one writer thread, one reader connection, one event sink.
///
/// Construction does no I/O. The database is opened on the first call that
/// needs it (or an explicit [`Engine::initialize`]); a failed initialization
/// is remembered and every later call reports the same error.
pub struct Engine {
    config: EngineConfig,
    sink: Arc<dyn EventSink>,
    ready: OnceLock<Result<Ready, String>>,
}

impl Engine {
    pub fn new(config: EngineConfig, sink: Arc<dyn EventSink>) -> Self {
        Self {
            config,
            sink,
            ready: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn initialize(&self) -> Result<(), EngineError> {
        self.ready().map(|_| ())
    }

    /// Schema outcome of the first initialization.
    pub fn schema_report(&self) -> Result<SchemaReport, EngineError> {
        Ok(self.ready()?.schema.clone())
    }

    fn ready(&self) -> Result<&Ready, EngineError> {
        let ready = self.ready.get_or_init(|| {
            self.open().map_err(|err| {
                tracing::error!(
                    error = %err,
                    code = err.code(),
                    fatal = err.is_fatal(),
                    "archive engine initialization failed"
                );
                err.to_string()
            })
        });
        ready
            .as_ref()
            .map_err(|message| EngineError::Init(message.clone()))
    }

    fn open(&self) -> Result<Ready, EngineError> {
        let options = self.config.store_options();
        let mut writer = SqliteStore::open(&self.config.storage_dir, &options)?;
        let schema = writer.ensure_schema(self.config.schema_version)?;
        let reader = SqliteStore::open(&self.config.storage_dir, &options)?;

        tracing::info!(
            db = %writer.db_path().display(),
            schema_version = self.config.schema_version,
            stored_version = ?schema.stored_version,
            rebuilt = schema.rebuilt,
            "archive engine ready"
        );

        let queue = WriteQueue::spawn(
            WRITER_THREAD_NAME,
            writer,
            self.config.backpressure_threshold,
        )?;
        Ok(Ready {
            queue,
            reader: Mutex::new(reader),
            schema,
        })
    }

    /// Runs one request and reports its result through the event sink.
    pub fn handle(&self, request: Request) {
        match request {
            Request::UpsertMessages { file, index, items } => {
                if let Err(err) = self.upsert_batch(file.clone(), index, items) {
                    self.sink.emit(Event::Error {
                        file,
                        index,
                        error: err.to_string(),
                    });
                }
            }
            Request::GetMessageById { id } => {
                let event = self.get_by_id(&id).map(|message| Event::Message {
                    data: message.map(MessageView::from),
                });
                self.emit_result(event);
            }
            Request::GetThread { root_id } => {
                let event = self.get_thread(&root_id).map(|messages| Event::Thread {
                    data: messages.into_iter().map(MessageView::from).collect(),
                });
                self.emit_result(event);
            }
            Request::SearchMessages { query, limit } => {
                let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
                let event = self.search(&query, limit).map(|messages| Event::SearchResults {
                    data: messages.into_iter().map(MessageView::from).collect(),
                });
                self.emit_result(event);
            }
        }
    }

    /// Sends an event that did not come from a request, such as a parse
    /// failure seen by the transport.
    pub fn emit(&self, event: Event) {
        self.sink.emit(event);
    }

    fn emit_result(&self, event: Result<Event, EngineError>) {
        match event {
            Ok(event) => self.sink.emit(event),
            Err(err) => {
                tracing::warn!(error = %err, code = err.code(), "request failed");
                self.sink.emit(Event::unknown_error(err.to_string()));
            }
        }
    }

    /// Queues `items` for ingestion and returns the number of jobs queued.
    ///
    /// Progress, completion and failures arrive later as events tagged with
    /// `source_label` and `sequence_tag`.
    pub fn upsert_batch(
        &self,
        source_label: impl Into<String>,
        sequence_tag: Option<u64>,
        items: Vec<UpsertMessageItem>,
    ) -> Result<usize, EngineError> {
        let ready = self.ready()?;
        let reporter = Arc::new(BatchReporter::new(
            Arc::clone(&self.sink),
            source_label.into(),
            sequence_tag,
            items.len(),
        ));
        let jobs = chunk_jobs(items, self.config.chunk_size, reporter);
        let queued = jobs.len();

        let sink = Arc::clone(&self.sink);
        let on_backpressure = move |level: usize| sink.emit(Event::Backpressure { level });
        for job in jobs {
            ready.queue.enqueue(job, Some(&on_backpressure))?;
        }
        Ok(queued)
    }

    pub fn get_by_id(&self, id: &str) -> Result<Option<Message>, EngineError> {
        Ok(self.ready()?.reader().get_by_id(id)?)
    }

    pub fn get_thread(&self, root_id: &str) -> Result<Vec<Message>, EngineError> {
        Ok(self.ready()?.reader().get_thread(root_id)?)
    }

    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<Message>, EngineError> {
        Ok(self.ready()?.reader().search(query, limit)?)
    }

    pub fn queue_depth(&self) -> usize {
        match self.ready.get() {
            Some(Ok(ready)) => ready.queue.depth(),
            _ => 0,
        }
    }

    pub fn queue_state(&self) -> QueueState {
        match self.ready.get() {
            Some(Ok(ready)) => ready.queue.state(),
            _ => QueueState::Idle,
        }
    }

    /// Blocks until every queued write has been applied.
    pub fn flush(&self) {
        if let Some(Ok(ready)) = self.ready.get() {
            ready.queue.wait_idle();
        }
    }

    /// Drains outstanding writes and stops the writer thread. Later upserts
    /// fail with [`EngineError::ShutDown`].
    pub fn shutdown(&self) {
        if let Some(Ok(ready)) = self.ready.get() {
            ready.queue.shutdown();
            tracing::info!("archive engine shut down");
        }
    }
}
