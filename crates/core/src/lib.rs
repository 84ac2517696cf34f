#![forbid(unsafe_code)]

pub mod model;
pub mod thread;

pub use model::{Message, MessageDraft, PreparedMessage};

pub mod path {
    pub const LABEL_SEPARATOR: char = '.';
    const FALLBACK_LABEL: &str = "x";

    /// Maps an opaque message id onto a single path label.
    ///
    /// Every char outside `[A-Za-z0-9_]` becomes `_`, runs of `_` collapse into
    /// one, and an empty result falls back to `x`.
    pub fn sanitize_label(raw: &str) -> String {
        let mut out = String::with_capacity(raw.len());
        for ch in raw.chars() {
            let mapped = if ch.is_ascii_alphanumeric() { ch } else { '_' };
            if mapped == '_' && out.ends_with('_') {
                continue;
            }
            out.push(mapped);
        }
        if out.is_empty() {
            return FALLBACK_LABEL.to_string();
        }
        out
    }

    pub fn compute_path(parent_path: Option<&str>, id: &str) -> String {
        let label = sanitize_label(id);
        match parent_path {
            Some(parent) if !parent.is_empty() => format!("{parent}{LABEL_SEPARATOR}{label}"),
            _ => label,
        }
    }

    /// True when `path` equals `root` or descends from it.
    pub fn is_within(path: &str, root: &str) -> bool {
        match path.strip_prefix(root) {
            Some("") => true,
            Some(rest) => rest.starts_with(LABEL_SEPARATOR),
            None => false,
        }
    }

    /// Exclusive upper bound for a range scan over the descendants of `root`.
    ///
    /// Labels only contain `[A-Za-z0-9_]`, and `/` is the byte right after `.`,
    /// so every `root.*` path sorts strictly inside `(root., root/)`.
    pub fn subtree_upper_bound(root: &str) -> String {
        format!("{root}/")
    }

    pub fn depth(path: &str) -> usize {
        if path.is_empty() {
            return 0;
        }
        path.split(LABEL_SEPARATOR).count()
    }

}

pub mod search {
    /// Text the full-text index tokenizes for a message.
    pub fn search_document(subject: &str, content: &str) -> String {
        let subject = subject.trim();
        let content = content.trim();
        match (subject.is_empty(), content.is_empty()) {
            (true, true) => String::new(),
            (false, true) => subject.to_string(),
            (true, false) => content.to_string(),
            (false, false) => format!("{subject} {content}"),
        }
    }

    /// Turns free text into an FTS5 query matching rows that contain every term.
    ///
    /// Operators and punctuation in the input are never interpreted; each
    /// alphanumeric run becomes a quoted term. Returns `None` when nothing
    /// searchable is left.
    pub fn plain_fts_query(raw: &str) -> Option<String> {
        let mut terms: Vec<String> = Vec::new();
        for term in raw.split(|ch: char| !ch.is_alphanumeric()) {
            if term.is_empty() {
                continue;
            }
            let term = term.to_lowercase();
            if terms.contains(&term) {
                continue;
            }
            terms.push(term);
        }
        if terms.is_empty() {
            return None;
        }
        Some(
            terms
                .iter()
                .map(|term| format!("\"{term}\""))
                .collect::<Vec<_>>()
                .join(" AND "),
        )
    }

}
