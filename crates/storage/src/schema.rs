#![forbid(unsafe_code)]

use crate::{SqliteStore, StoreError, now_ms};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

/// Bumping this drops every stored message on the next start; sources are
/// expected to be re-imported.
pub const CURRENT_SCHEMA_VERSION: i64 = 2;

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const CAPABILITY_PROBES: &[(&str, &str)] = &[
    ("full-text", "porter unicode61"),
    ("trigram", "trigram"),
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetaRow {
    pub schema_version: i64,
    pub app_version: Option<String>,
    pub last_import_ts: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SchemaReport {
    /// Version found in `meta` before this call; `None` on a fresh database.
    pub stored_version: Option<i64>,
    pub rebuilt: bool,
}

impl SqliteStore {
    /// Verifies capabilities and brings the schema to `expected_version`.
    ///
    /// Safe to call repeatedly. A stored version different from
    /// `expected_version` drops the message table before it is recreated.
    pub fn ensure_schema(&mut self, expected_version: i64) -> Result<SchemaReport, StoreError> {
        verify_capabilities(&self.conn)?;

        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS meta (
              singleton INTEGER PRIMARY KEY CHECK(singleton = 1),
              schema_version INTEGER NOT NULL,
              app_version TEXT,
              last_import_ts INTEGER
            );
            "#,
        )?;

        let stored_version = self
            .conn
            .query_row(
                "SELECT schema_version FROM meta WHERE singleton=1",
                [],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;

        let mut report = SchemaReport {
            stored_version,
            rebuilt: false,
        };

        match stored_version {
            None => {
                self.conn.execute(
                    "INSERT INTO meta(singleton, schema_version, app_version, last_import_ts) \
                     VALUES (1, ?1, ?2, NULL)",
                    params![expected_version, APP_VERSION],
                )?;
                tracing::info!(schema_version = expected_version, "created meta row");
            }
            Some(stored) if stored != expected_version => {
                tracing::warn!(
                    stored_version = stored,
                    expected_version,
                    "schema version mismatch; dropping stored messages"
                );
                let tx = self
                    .conn
                    .transaction_with_behavior(TransactionBehavior::Immediate)?;
                tx.execute_batch(
                    r#"
                    DROP TRIGGER IF EXISTS messages_fts_ai;
                    DROP TRIGGER IF EXISTS messages_fts_ad;
                    DROP TRIGGER IF EXISTS messages_fts_au;
                    DROP TABLE IF EXISTS messages_fts;
                    DROP TABLE IF EXISTS messages;
                    "#,
                )?;
                tx.execute(
                    "UPDATE meta SET schema_version=?1, app_version=?2 WHERE singleton=1",
                    params![expected_version, APP_VERSION],
                )?;
                tx.commit()?;
                report.rebuilt = true;
            }
            Some(_) => {}
        }

        install_message_schema(&self.conn)?;
        Ok(report)
    }

    pub fn meta(&self) -> Result<Option<MetaRow>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT schema_version, app_version, last_import_ts FROM meta WHERE singleton=1",
                [],
                |row| {
                    Ok(MetaRow {
                        schema_version: row.get(0)?,
                        app_version: row.get(1)?,
                        last_import_ts: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    /// Names of the indexes defined on `messages`, sorted.
    pub fn message_indexes(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type='index' AND tbl_name='messages' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    pub fn has_table(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1",
                params![name],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
            .is_some())
    }
}

pub(crate) fn record_import_now(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE meta SET last_import_ts=?1 WHERE singleton=1",
        params![now_ms()],
    )?;
    Ok(())
}

fn verify_capabilities(conn: &Connection) -> Result<(), StoreError> {
    for &(capability, tokenizer) in CAPABILITY_PROBES {
        let sql = format!(
            "DROP TABLE IF EXISTS temp.la_capability_probe; \
             CREATE VIRTUAL TABLE temp.la_capability_probe USING fts5(body, tokenize='{tokenizer}'); \
             DROP TABLE temp.la_capability_probe;"
        );
        if let Err(err) = conn.execute_batch(&sql) {
            return Err(StoreError::CapabilityUnavailable {
                capability,
                detail: err.to_string(),
            });
        }
    }
    Ok(())
}

fn install_message_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
          id TEXT PRIMARY KEY,
          subject TEXT NOT NULL DEFAULT '',
          from_addr TEXT NOT NULL DEFAULT '',
          date INTEGER NOT NULL,
          in_reply_to TEXT,
          refs TEXT,
          content TEXT NOT NULL DEFAULT '',
          month_file TEXT NOT NULL DEFAULT '',
          path TEXT NOT NULL,
          search TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS messages_path_idx ON messages(path);
        CREATE INDEX IF NOT EXISTS messages_date_idx ON messages(date);
        CREATE INDEX IF NOT EXISTS messages_in_reply_to_idx ON messages(in_reply_to);

        CREATE VIRTUAL TABLE IF NOT EXISTS messages_fts USING fts5(
          search,
          content='messages',
          content_rowid='rowid',
          tokenize='porter unicode61'
        );

        CREATE TRIGGER IF NOT EXISTS messages_fts_ai AFTER INSERT ON messages BEGIN
          INSERT INTO messages_fts(rowid, search) VALUES (new.rowid, new.search);
        END;

        CREATE TRIGGER IF NOT EXISTS messages_fts_ad AFTER DELETE ON messages BEGIN
          INSERT INTO messages_fts(messages_fts, rowid, search)
          VALUES ('delete', old.rowid, old.search);
        END;

        CREATE TRIGGER IF NOT EXISTS messages_fts_au AFTER UPDATE ON messages BEGIN
          INSERT INTO messages_fts(messages_fts, rowid, search)
          VALUES ('delete', old.rowid, old.search);
          INSERT INTO messages_fts(rowid, search) VALUES (new.rowid, new.search);
        END;
        "#,
    )?;
    Ok(())
}
