#![forbid(unsafe_code)]

//! Single-writer job queue.
//!
//! Jobs are boxed closures that receive exclusive access to a context owned by
//! one background thread (for the engine, the writer `SqliteStore`). They run
//! strictly one at a time in FIFO order.

use crate::EngineError;
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

pub type Job<C> = Box<dyn FnOnce(&mut C) -> JobOutcome + Send + 'static>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    Applied { rows: usize },
    Skipped,
    Failed { error: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueState {
    Idle,
    Draining,
}

struct Inner<C> {
    jobs: VecDeque<Job<C>>,
    state: QueueState,
    closed: bool,
}

struct Shared<C> {
    inner: Mutex<Inner<C>>,
    wake: Condvar,
    idle: Condvar,
}

impl<C> Shared<C> {
    fn lock(&self) -> MutexGuard<'_, Inner<C>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct WriteQueue<C: Send + 'static> {
    shared: Arc<Shared<C>>,
    threshold: usize,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<C: Send + 'static> WriteQueue<C> {
    /// Moves `context` onto a new named thread that drains the queue.
    pub fn spawn(name: &str, context: C, threshold: usize) -> Result<Self, EngineError> {
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                jobs: VecDeque::new(),
                state: QueueState::Idle,
                closed: false,
            }),
            wake: Condvar::new(),
            idle: Condvar::new(),
        });

        let drain_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || drain_loop(drain_shared, context))
            .map_err(EngineError::WriterSpawn)?;

        Ok(Self {
            shared,
            threshold,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Appends `job` and returns the number of jobs not yet started.
    ///
    /// When that number exceeds the threshold, `on_backpressure` is invoked
    /// with it before returning. The job is accepted either way.
    pub fn enqueue(
        &self,
        job: Job<C>,
        on_backpressure: Option<&dyn Fn(usize)>,
    ) -> Result<usize, EngineError> {
        let (depth, was_idle) = {
            let mut inner = self.shared.lock();
            if inner.closed {
                return Err(EngineError::ShutDown);
            }
            inner.jobs.push_back(job);
            (inner.jobs.len(), inner.state == QueueState::Idle)
        };

        if depth > self.threshold {
            tracing::warn!(depth, threshold = self.threshold, "write queue backpressure");
            if let Some(callback) = on_backpressure {
                callback(depth);
            }
        }
        if was_idle {
            self.shared.wake.notify_one();
        }
        Ok(depth)
    }

    pub fn depth(&self) -> usize {
        self.shared.lock().jobs.len()
    }

    pub fn state(&self) -> QueueState {
        self.shared.lock().state
    }

    /// Blocks until every job enqueued so far has finished.
    pub fn wait_idle(&self) {
        let mut inner = self.shared.lock();
        while !inner.jobs.is_empty() || inner.state == QueueState::Draining {
            inner = self
                .shared
                .idle
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Stops accepting jobs, runs the ones already queued, then joins the
    /// writer thread. Calling it again is a no-op.
    pub fn shutdown(&self) {
        {
            let mut inner = self.shared.lock();
            inner.closed = true;
        }
        self.shared.wake.notify_all();

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                tracing::error!("writer thread terminated abnormally");
            }
        }
    }
}

impl<C: Send + 'static> Drop for WriteQueue<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn drain_loop<C>(shared: Arc<Shared<C>>, mut context: C) {
    loop {
        let job = {
            let mut inner = shared.lock();
            loop {
                if let Some(job) = inner.jobs.pop_front() {
                    inner.state = QueueState::Draining;
                    break job;
                }
                if inner.state == QueueState::Draining {
                    inner.state = QueueState::Idle;
                    shared.idle.notify_all();
                }
                if inner.closed {
                    return;
                }
                inner = shared
                    .wake
                    .wait(inner)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };

        let outcome = match catch_unwind(AssertUnwindSafe(|| job(&mut context))) {
            Ok(outcome) => outcome,
            Err(payload) => JobOutcome::Failed {
                error: format!("job panicked: {}", panic_message(payload.as_ref())),
            },
        };
        match &outcome {
            JobOutcome::Applied { rows } => tracing::debug!(rows, "write job applied"),
            JobOutcome::Skipped => tracing::debug!("write job skipped"),
            JobOutcome::Failed { error } => tracing::error!(%error, "write job failed"),
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
