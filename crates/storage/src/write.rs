#![forbid(unsafe_code)]

use crate::schema::record_import_now;
use crate::{SqliteStore, StoreError, placeholders};
use la_core::PreparedMessage;
use rusqlite::types::Value;
use rusqlite::{TransactionBehavior, params_from_iter};
use std::collections::HashMap;

// Default SQLITE_MAX_VARIABLE_NUMBER for the bundled library (>= 3.32).
const MAX_BOUND_VARIABLES: usize = 32_766;
const UPSERT_COLUMNS: usize = 10;

const UPSERT_PREFIX: &str = "INSERT INTO messages \
     (id, subject, from_addr, date, in_reply_to, refs, content, month_file, path, search) VALUES ";

const UPSERT_CONFLICT: &str = " ON CONFLICT(id) DO UPDATE SET \
       subject=excluded.subject, \
       from_addr=excluded.from_addr, \
       date=excluded.date, \
       in_reply_to=excluded.in_reply_to, \
       refs=excluded.refs, \
       content=excluded.content, \
       month_file=excluded.month_file, \
       path=excluded.path, \
       search=excluded.search";

impl SqliteStore {
    /// Current paths for the given ids; ids that are not stored are absent.
    pub fn fetch_paths(&self, ids: &[String]) -> Result<HashMap<String, String>, StoreError> {
        let mut out = HashMap::with_capacity(ids.len());
        for batch in ids.chunks(MAX_BOUND_VARIABLES) {
            let sql = format!(
                "SELECT id, path FROM messages WHERE id IN ({})",
                placeholders(batch.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(batch.iter()))?;
            while let Some(row) = rows.next()? {
                out.insert(row.get::<_, String>(0)?, row.get::<_, String>(1)?);
            }
        }
        Ok(out)
    }

    /// Inserts or fully overwrites every row in one transaction.
    ///
    /// Rows are written with a single multi-row statement unless the bound
    /// variable limit forces a split. Returns the number of rows written.
    pub fn upsert_messages(&mut self, rows: &[PreparedMessage]) -> Result<usize, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        for batch in rows.chunks(MAX_BOUND_VARIABLES / UPSERT_COLUMNS) {
            let tuple = format!("({})", placeholders(UPSERT_COLUMNS));
            let mut sql = String::with_capacity(
                UPSERT_PREFIX.len() + UPSERT_CONFLICT.len() + batch.len() * (tuple.len() + 1),
            );
            sql.push_str(UPSERT_PREFIX);
            sql.push_str(&vec![tuple; batch.len()].join(","));
            sql.push_str(UPSERT_CONFLICT);

            let mut values: Vec<Value> = Vec::with_capacity(batch.len() * UPSERT_COLUMNS);
            for row in batch {
                push_row_values(&mut values, row)?;
            }
            tx.execute(&sql, params_from_iter(values.iter()))?;
        }
        record_import_now(&tx)?;
        tx.commit()?;

        tracing::debug!(rows = rows.len(), "upserted messages");
        Ok(rows.len())
    }
}

fn push_row_values(values: &mut Vec<Value>, row: &PreparedMessage) -> Result<(), StoreError> {
    let draft = &row.draft;
    let refs = match &draft.references {
        Some(list) => Value::Text(serde_json::to_string(list)?),
        None => Value::Null,
    };
    values.push(Value::Text(draft.id.clone()));
    values.push(Value::Text(draft.subject.clone()));
    values.push(Value::Text(draft.from_addr.clone()));
    values.push(Value::Integer(draft.date_ms));
    values.push(match &draft.in_reply_to {
        Some(parent) => Value::Text(parent.clone()),
        None => Value::Null,
    });
    values.push(refs);
    values.push(Value::Text(draft.content.clone()));
    values.push(Value::Text(draft.month_file.clone()));
    values.push(Value::Text(row.path.clone()));
    values.push(Value::Text(row.search.clone()));
    Ok(())
}
