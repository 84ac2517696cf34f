#![forbid(unsafe_code)]

/// A message as submitted for ingestion, before its path is known.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageDraft {
    pub id: String,
    pub subject: String,
    pub from_addr: String,
    pub date_ms: i64,
    pub in_reply_to: Option<String>,
    pub references: Option<Vec<String>>,
    pub content: String,
    pub month_file: String,
}

/// A draft with its derived columns, ready to be written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedMessage {
    pub draft: MessageDraft,
    pub path: String,
    pub search: String,
}

impl PreparedMessage {
    pub fn new(draft: MessageDraft, path: String) -> Self {
        let search = crate::search::search_document(&draft.subject, &draft.content);
        Self {
            draft,
            path,
            search,
        }
    }
}

/// A persisted message as returned by lookups.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub subject: String,
    pub from_addr: String,
    pub date_ms: i64,
    pub in_reply_to: Option<String>,
    pub references: Option<Vec<String>>,
    pub content: String,
    pub month_file: String,
    pub path: String,
}

impl Message {
    pub fn is_root(&self) -> bool {
        !self.path.contains(crate::path::LABEL_SEPARATOR)
    }

    pub fn depth(&self) -> usize {
        crate::path::depth(&self.path)
    }
}
