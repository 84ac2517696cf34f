#![forbid(unsafe_code)]

//! JSON request and message shapes exchanged with the host.

use crate::EngineError;
use la_core::{Message, MessageDraft};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::{Date, OffsetDateTime, PrimitiveDateTime};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Request {
    UpsertMessages {
        file: String,
        #[serde(default)]
        index: Option<u64>,
        items: Vec<UpsertMessageItem>,
    },
    GetMessageById {
        id: String,
    },
    GetThread {
        root_id: String,
    },
    SearchMessages {
        query: String,
        #[serde(default)]
        limit: Option<usize>,
    },
}

/// One parsed message as produced by the mbox reader.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertMessageItem {
    pub id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub from_addr: String,
    pub date_iso: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<Vec<String>>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub month_file: String,
}

impl UpsertMessageItem {
    pub fn into_draft(self) -> Result<MessageDraft, EngineError> {
        let date_ms = parse_date_ms(&self.date_iso)?;
        Ok(MessageDraft {
            id: self.id,
            subject: self.subject,
            from_addr: self.from_addr,
            date_ms,
            in_reply_to: self.in_reply_to.filter(|parent| !parent.trim().is_empty()),
            references: self.references,
            content: self.content,
            month_file: self.month_file,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: String,
    pub subject: String,
    pub from_addr: String,
    pub date: String,
    pub in_reply_to: Option<String>,
    pub references: Option<Vec<String>>,
    pub content: String,
    pub month_file: String,
    pub path: String,
}

impl From<Message> for MessageView {
    fn from(message: Message) -> Self {
        Self {
            date: format_date_ms(message.date_ms),
            id: message.id,
            subject: message.subject,
            from_addr: message.from_addr,
            in_reply_to: message.in_reply_to,
            references: message.references,
            content: message.content,
            month_file: message.month_file,
            path: message.path,
        }
    }
}

/// Accepts RFC 3339 and the wider ISO 8601 forms; a timestamp without an
/// offset is taken as UTC and a bare date as its midnight UTC.
pub fn parse_date_ms(raw: &str) -> Result<i64, EngineError> {
    let trimmed = raw.trim();
    let parsed = OffsetDateTime::parse(trimmed, &Rfc3339)
        .or_else(|_| OffsetDateTime::parse(trimmed, &Iso8601::DEFAULT))
        .or_else(|_| {
            PrimitiveDateTime::parse(trimmed, &Iso8601::DEFAULT).map(PrimitiveDateTime::assume_utc)
        })
        .or_else(|_| {
            Date::parse(trimmed, &Iso8601::DEFAULT).map(|date| date.midnight().assume_utc())
        });

    let datetime = parsed.map_err(|err| EngineError::InvalidDate {
        value: raw.to_string(),
        reason: err.to_string(),
    })?;
    i64::try_from(datetime.unix_timestamp_nanos() / 1_000_000).map_err(|_| {
        EngineError::InvalidDate {
            value: raw.to_string(),
            reason: "timestamp out of range".to_string(),
        }
    })
}

pub fn format_date_ms(date_ms: i64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(date_ms) * 1_000_000)
        .ok()
        .and_then(|datetime| datetime.format(&Rfc3339).ok())
        .unwrap_or_else(|| date_ms.to_string())
}
