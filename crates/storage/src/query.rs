#![forbid(unsafe_code)]

use crate::{SqliteStore, StoreError};
use la_core::Message;
use la_core::path::{LABEL_SEPARATOR, subtree_upper_bound};
use la_core::search::plain_fts_query;
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row, params};

pub const DEFAULT_SEARCH_LIMIT: usize = 50;

const MESSAGE_COLUMNS: &str =
    "m.id, m.subject, m.from_addr, m.date, m.in_reply_to, m.refs, m.content, m.month_file, m.path";

impl SqliteStore {
    pub fn get_by_id(&self, id: &str) -> Result<Option<Message>, StoreError> {
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages m WHERE m.id=?1 LIMIT 1");
        Ok(self
            .conn
            .query_row(&sql, params![id], message_from_row)
            .optional()?)
    }

    /// The root message and everything below it, oldest first.
    pub fn get_thread(&self, root_id: &str) -> Result<Vec<Message>, StoreError> {
        let root_path = self
            .conn
            .query_row(
                "SELECT path FROM messages WHERE id=?1 LIMIT 1",
                params![root_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        let Some(root_path) = root_path else {
            return Ok(Vec::new());
        };

        let lower = format!("{root_path}{LABEL_SEPARATOR}");
        let upper = subtree_upper_bound(&root_path);
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages m \
             WHERE m.path=?1 OR (m.path > ?2 AND m.path < ?3) \
             ORDER BY m.date ASC, m.path ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![root_path, lower, upper], message_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Full-text matches, most relevant first; equal relevance prefers the
    /// newer message.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<Message>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let Some(fts_query) = plain_fts_query(query) else {
            return Ok(Vec::new());
        };
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let sql = format!(
            "SELECT {MESSAGE_COLUMNS}, bm25(messages_fts) AS score \
             FROM messages_fts \
             JOIN messages m ON m.rowid = messages_fts.rowid \
             WHERE messages_fts MATCH ?1 \
             ORDER BY score ASC, m.date DESC, m.id ASC \
             LIMIT ?2"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![fts_query, limit], message_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count_messages(&self) -> Result<usize, StoreError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get::<_, i64>(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    let refs: Option<String> = row.get(5)?;
    let references = match refs {
        Some(raw) => Some(serde_json::from_str::<Vec<String>>(&raw).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(err))
        })?),
        None => None,
    };
    Ok(Message {
        id: row.get(0)?,
        subject: row.get(1)?,
        from_addr: row.get(2)?,
        date_ms: row.get(3)?,
        in_reply_to: row.get(4)?,
        references,
        content: row.get(6)?,
        month_file: row.get(7)?,
        path: row.get(8)?,
    })
}
