#![forbid(unsafe_code)]

//! Chunked batch ingestion: one queue job per chunk.

use crate::EngineError;
use crate::events::BatchReporter;
use crate::protocol::UpsertMessageItem;
use crate::queue::{Job, JobOutcome, panic_message};
use la_core::path::depth;
use la_core::thread::{dedupe_last_wins, external_parent_ids, prepare_chunk};
use la_storage::SqliteStore;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ChunkReport {
    pub received: usize,
    pub written: usize,
    pub duplicates: usize,
    pub orphans: usize,
}

/// Splits `items` into jobs of at most `chunk_size` items, in order.
///
/// An empty batch still yields one job so the caller hears `done`.
pub(crate) fn chunk_jobs(
    items: Vec<UpsertMessageItem>,
    chunk_size: usize,
    reporter: Arc<BatchReporter>,
) -> Vec<Job<SqliteStore>> {
    if items.is_empty() {
        let job: Job<SqliteStore> = Box::new(move |_store: &mut SqliteStore| {
            reporter.empty_batch();
            JobOutcome::Skipped
        });
        return vec![job];
    }

    let chunk_size = chunk_size.max(1);
    let mut jobs = Vec::with_capacity(items.len().div_ceil(chunk_size));
    let mut rest = items.into_iter().peekable();
    while rest.peek().is_some() {
        let chunk: Vec<UpsertMessageItem> = rest.by_ref().take(chunk_size).collect();
        jobs.push(chunk_job(chunk, Arc::clone(&reporter)));
    }
    jobs
}

fn chunk_job(chunk: Vec<UpsertMessageItem>, reporter: Arc<BatchReporter>) -> Job<SqliteStore> {
    Box::new(move |store: &mut SqliteStore| {
        let received = chunk.len();
        let result = catch_unwind(AssertUnwindSafe(|| apply_chunk(store, chunk)));
        let error = match result {
            Ok(Ok(report)) => {
                tracing::debug!(
                    file = reporter.file(),
                    received = report.received,
                    written = report.written,
                    duplicates = report.duplicates,
                    orphans = report.orphans,
                    "chunk applied"
                );
                reporter.chunk_applied(received);
                return JobOutcome::Applied {
                    rows: report.written,
                };
            }
            Ok(Err(err)) => format!("{}: {err}", err.code()),
            Err(payload) => format!("chunk panicked: {}", panic_message(payload.as_ref())),
        };
        tracing::error!(file = reporter.file(), received, %error, "chunk failed");
        reporter.chunk_failed(error.clone());
        JobOutcome::Failed { error }
    })
}

/// Runs one chunk against the writer store inside a single transaction.
pub(crate) fn apply_chunk(
    store: &mut SqliteStore,
    items: Vec<UpsertMessageItem>,
) -> Result<ChunkReport, EngineError> {
    let received = items.len();
    let drafts = items
        .into_iter()
        .map(UpsertMessageItem::into_draft)
        .collect::<Result<Vec<_>, _>>()?;

    let deduped = dedupe_last_wins(drafts);
    for duplicate in &deduped.duplicates {
        tracing::warn!(
            id = %duplicate.id,
            previous_subject = %duplicate.previous.subject,
            previous_date_ms = duplicate.previous.date_ms,
            previous_from = %duplicate.previous.from_addr,
            replacement_subject = %duplicate.replacement.subject,
            replacement_date_ms = duplicate.replacement.date_ms,
            replacement_from = %duplicate.replacement.from_addr,
            "duplicate id in chunk; keeping the later item"
        );
    }

    let parents = external_parent_ids(&deduped.items);
    let persisted = store.fetch_paths(&parents)?;
    let rows = prepare_chunk(deduped.items, &persisted);
    let orphans = rows
        .iter()
        .filter(|row| row.draft.in_reply_to.is_some() && depth(&row.path) == 1)
        .count();
    let written = store.upsert_messages(&rows)?;

    Ok(ChunkReport {
        received,
        written,
        duplicates: deduped.duplicates.len(),
        orphans,
    })
}
