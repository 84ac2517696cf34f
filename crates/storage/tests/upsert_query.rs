#![forbid(unsafe_code)]

use la_core::thread::{dedupe_last_wins, external_parent_ids, prepare_chunk};
use la_core::{MessageDraft, PreparedMessage};
use la_storage::{CURRENT_SCHEMA_VERSION, SqliteStore, StoreOptions};
use std::collections::HashMap;
use tempfile::TempDir;

const HOUR_MS: i64 = 3_600_000;
const BASE_MS: i64 = 1_704_067_200_000;

fn ready_store() -> (TempDir, SqliteStore) {
    let dir = TempDir::new().expect("temp dir");
    let mut store = SqliteStore::open(dir.path(), &StoreOptions::default()).expect("open");
    store
        .ensure_schema(CURRENT_SCHEMA_VERSION)
        .expect("schema should install");
    (dir, store)
}

fn draft(id: &str, parent: Option<&str>, hours: i64) -> MessageDraft {
    MessageDraft {
        id: id.to_string(),
        subject: format!("thread about {id}"),
        from_addr: format!("{id}@example.org"),
        date_ms: BASE_MS + hours * HOUR_MS,
        in_reply_to: parent.map(str::to_string),
        references: parent.map(|p| vec![p.to_string()]),
        content: format!("body of {id}"),
        month_file: "2024-01".to_string(),
    }
}

/// Mirrors what the write queue does for one chunk.
fn ingest(store: &mut SqliteStore, items: Vec<MessageDraft>) -> Vec<PreparedMessage> {
    let deduped = dedupe_last_wins(items);
    let persisted = store
        .fetch_paths(&external_parent_ids(&deduped.items))
        .expect("parent lookup");
    let rows = prepare_chunk(deduped.items, &persisted);
    store.upsert_messages(&rows).expect("upsert");
    rows
}

#[test]
fn get_by_id_returns_all_fields() {
    let (_dir, mut store) = ready_store();
    ingest(&mut store, vec![draft("root", None, 0), draft("child", Some("root"), 1)]);

    let child = store.get_by_id("child").expect("lookup").expect("child row");
    assert_eq!(child.subject, "thread about child");
    assert_eq!(child.from_addr, "child@example.org");
    assert_eq!(child.date_ms, BASE_MS + HOUR_MS);
    assert_eq!(child.in_reply_to.as_deref(), Some("root"));
    assert_eq!(child.references, Some(vec!["root".to_string()]));
    assert_eq!(child.month_file, "2024-01");
    assert_eq!(child.path, "root.child");
    assert!(!child.is_root());
    assert_eq!(child.depth(), 2);

    let root = store.get_by_id("root").expect("lookup").expect("root row");
    assert_eq!(root.references, None);
    assert!(root.is_root());
    assert_eq!(root.depth(), 1);
}

#[test]
fn get_by_id_missing_is_none() {
    let (_dir, store) = ready_store();
    assert!(store.get_by_id("nope").expect("lookup").is_none());
}

#[test]
fn reupsert_overwrites_every_field_and_search_text() {
    let (_dir, mut store) = ready_store();
    let mut first = draft("m1", None, 0);
    first.content = "alpha".to_string();
    ingest(&mut store, vec![first]);
    assert_eq!(store.search("alpha", 10).expect("search").len(), 1);

    let mut second = draft("m1", None, 5);
    second.subject = "renamed".to_string();
    second.content = "beta".to_string();
    second.month_file = "2024-02".to_string();
    ingest(&mut store, vec![second]);

    assert_eq!(store.count_messages().expect("count"), 1);
    let row = store.get_by_id("m1").expect("lookup").expect("row");
    assert_eq!(row.subject, "renamed");
    assert_eq!(row.content, "beta");
    assert_eq!(row.month_file, "2024-02");
    assert_eq!(row.date_ms, BASE_MS + 5 * HOUR_MS);
    assert!(store.search("alpha", 10).expect("search").is_empty());
    assert_eq!(store.search("beta", 10).expect("search").len(), 1);
}

#[test]
fn identical_reupsert_leaves_same_state() {
    let (_dir, mut store) = ready_store();
    let items = vec![draft("a", None, 0), draft("b", Some("a"), 1)];
    ingest(&mut store, items.clone());
    let thread_once = store.get_thread("a").expect("thread");
    let search_once = store.search("thread", 10).expect("search");

    ingest(&mut store, items);
    assert_eq!(store.count_messages().expect("count"), 2);
    assert_eq!(store.get_thread("a").expect("thread"), thread_once);
    assert_eq!(store.search("thread", 10).expect("search"), search_once);
}

#[test]
fn duplicate_ids_in_one_chunk_keep_the_last() {
    let (_dir, mut store) = ready_store();
    let mut later = draft("dup", None, 2);
    later.subject = "second version".to_string();
    ingest(&mut store, vec![draft("dup", None, 1), later.clone()]);

    let row = store.get_by_id("dup").expect("lookup").expect("row");
    assert_eq!(row.subject, "second version");
    assert_eq!(row.date_ms, later.date_ms);
}

#[test]
fn fetch_paths_returns_only_stored_ids() {
    let (_dir, mut store) = ready_store();
    ingest(&mut store, vec![draft("a", None, 0), draft("b", Some("a"), 1)]);

    let paths = store
        .fetch_paths(&["a".to_string(), "b".to_string(), "ghost".to_string()])
        .expect("paths");
    assert_eq!(
        paths,
        HashMap::from([
            ("a".to_string(), "a".to_string()),
            ("b".to_string(), "a.b".to_string()),
        ])
    );
    assert!(store.fetch_paths(&[]).expect("empty").is_empty());
}

#[test]
fn reply_in_later_chunk_extends_persisted_parent() {
    let (_dir, mut store) = ready_store();
    ingest(&mut store, vec![draft("a", None, 0)]);
    ingest(&mut store, vec![draft("b", Some("a"), 1)]);
    ingest(&mut store, vec![draft("c", Some("b"), 2)]);

    let c = store.get_by_id("c").expect("lookup").expect("row");
    assert_eq!(c.path, "a.b.c");
}

#[test]
fn orphan_reply_is_stored_as_root() {
    let (_dir, mut store) = ready_store();
    ingest(&mut store, vec![draft("late-reply", Some("missing-parent"), 0)]);

    let row = store.get_by_id("late-reply").expect("lookup").expect("row");
    assert_eq!(row.path, "late_reply");
    assert_eq!(row.in_reply_to.as_deref(), Some("missing-parent"));

    // The parent arriving later does not repair the stored child.
    ingest(&mut store, vec![draft("missing-parent", None, 1)]);
    let row = store.get_by_id("late-reply").expect("lookup").expect("row");
    assert_eq!(row.path, "late_reply");
    assert!(store
        .get_thread("missing-parent")
        .expect("thread")
        .iter()
        .all(|m| m.id != "late-reply"));
}

#[test]
fn thread_is_subtree_ordered_by_date() {
    let (_dir, mut store) = ready_store();
    ingest(
        &mut store,
        vec![
            draft("a", None, 0),
            draft("b", Some("a"), 3),
            draft("c", Some("a"), 1),
            draft("d", Some("b"), 2),
            draft("ab", None, 0),
            draft("a_b", None, 0),
            draft("x", Some("ab"), 4),
        ],
    );

    let ids = |rows: Vec<la_core::Message>| rows.into_iter().map(|m| m.id).collect::<Vec<_>>();
    assert_eq!(ids(store.get_thread("a").expect("thread")), vec!["a", "c", "d", "b"]);
    assert_eq!(ids(store.get_thread("b").expect("thread")), vec!["d", "b"]);
    assert_eq!(ids(store.get_thread("ab").expect("thread")), vec!["ab", "x"]);
    assert!(store.get_thread("missing").expect("thread").is_empty());
}

#[test]
fn search_breaks_relevance_ties_by_newest_date() {
    let (_dir, mut store) = ready_store();
    let mut older = draft("older", None, 0);
    older.subject = "announce".to_string();
    older.content = "the release is out".to_string();
    let mut newer = draft("newer", None, 24);
    newer.subject = "announce".to_string();
    newer.content = "the release is out".to_string();
    let mut other = draft("other", None, 48);
    other.subject = "unrelated".to_string();
    other.content = "nothing to see".to_string();
    ingest(&mut store, vec![older, newer, other]);

    let hits = store.search("release", 10).expect("search");
    let ids = hits.iter().map(|m| m.id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, vec!["newer", "older"]);
}

#[test]
fn search_matches_stems_and_respects_limit() {
    let (_dir, mut store) = ready_store();
    let items = (0..5)
        .map(|n| {
            let mut item = draft(&format!("r{n}"), None, n);
            item.content = "new releases of the compiler".to_string();
            item
        })
        .collect::<Vec<_>>();
    ingest(&mut store, items);

    assert_eq!(store.search("release", 3).expect("search").len(), 3);
    assert_eq!(store.search("Releasing compiler", 50).expect("search").len(), 5);
    assert!(store.search("release", 0).expect("search").is_empty());
    assert!(store.search("  ?? ", 10).expect("search").is_empty());
    assert!(store.search("release AND nonexistent", 10).expect("search").is_empty());
}

#[test]
fn upsert_records_last_import_time() {
    let (_dir, mut store) = ready_store();
    assert_eq!(store.meta().expect("meta").expect("row").last_import_ts, None);
    ingest(&mut store, vec![draft("a", None, 0)]);
    let ts = store.meta().expect("meta").expect("row").last_import_ts;
    assert!(ts.is_some_and(|ts| ts > 0));
}

#[test]
fn large_chunk_upserts_in_one_call() {
    let (_dir, mut store) = ready_store();
    let items = (0..4_000)
        .map(|n| draft(&format!("bulk-{n}"), None, n % 48))
        .collect::<Vec<_>>();
    let rows = ingest(&mut store, items);
    assert_eq!(rows.len(), 4_000);
    assert_eq!(store.count_messages().expect("count"), 4_000);
}
