#![forbid(unsafe_code)]

//! Reply-chain handling for a single ingestion chunk.
//!
//! A chunk is deduplicated first (the last occurrence of an id wins), then
//! every item gets a materialized path. Parents present in the same chunk are
//! resolved before persisted ones, so a chunk may list a reply ahead of the
//! message it answers. Items whose parent cannot be found anywhere become
//! synthetic roots.

use crate::model::{MessageDraft, PreparedMessage};
use crate::path::compute_path;
use std::collections::{HashMap, HashSet};

/// One replaced occurrence of an id inside a chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Duplicate {
    pub id: String,
    pub previous: MessageDraft,
    pub replacement: MessageDraft,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Deduped {
    pub items: Vec<MessageDraft>,
    pub duplicates: Vec<Duplicate>,
}

/// Collapses repeated ids; later entries overwrite earlier ones but keep the
/// slot of the first occurrence.
pub fn dedupe_last_wins(items: Vec<MessageDraft>) -> Deduped {
    let mut slots: HashMap<String, usize> = HashMap::with_capacity(items.len());
    let mut out: Vec<MessageDraft> = Vec::with_capacity(items.len());
    let mut duplicates = Vec::new();

    for item in items {
        match slots.get(&item.id) {
            Some(&slot) => {
                let previous = std::mem::replace(&mut out[slot], item.clone());
                duplicates.push(Duplicate {
                    id: item.id.clone(),
                    previous,
                    replacement: item,
                });
            }
            None => {
                slots.insert(item.id.clone(), out.len());
                out.push(item);
            }
        }
    }

    Deduped {
        items: out,
        duplicates,
    }
}

/// Distinct parent ids that must come from the store, in first-seen order.
pub fn external_parent_ids(items: &[MessageDraft]) -> Vec<String> {
    let local: HashSet<&str> = items.iter().map(|item| item.id.as_str()).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = Vec::new();
    for parent in items.iter().filter_map(|item| item.in_reply_to.as_deref()) {
        if parent.is_empty() || local.contains(parent) || !seen.insert(parent) {
            continue;
        }
        out.push(parent.to_string());
    }
    out
}

/// Computes the path of every item, in input order.
///
/// `persisted` maps parent ids to the paths already stored for them. An item
/// that replies to itself, or closes a reply cycle inside the chunk, is
/// treated as a root.
pub fn resolve_paths(items: &[MessageDraft], persisted: &HashMap<String, String>) -> Vec<String> {
    let index: HashMap<&str, usize> = items
        .iter()
        .enumerate()
        .map(|(idx, item)| (item.id.as_str(), idx))
        .collect();
    let mut resolved: Vec<Option<String>> = vec![None; items.len()];

    for start in 0..items.len() {
        if resolved[start].is_some() {
            continue;
        }

        let mut chain = vec![start];
        let mut on_chain: HashSet<usize> = HashSet::from([start]);
        let mut base: Option<String> = None;
        let mut cursor = start;

        while let Some(parent_id) = items[cursor].in_reply_to.as_deref() {
            match index.get(parent_id) {
                Some(&parent) => {
                    if let Some(path) = &resolved[parent] {
                        base = Some(path.clone());
                        break;
                    }
                    if !on_chain.insert(parent) {
                        break;
                    }
                    chain.push(parent);
                    cursor = parent;
                }
                None => {
                    base = persisted.get(parent_id).cloned();
                    break;
                }
            }
        }

        let mut parent_path = base;
        for &idx in chain.iter().rev() {
            let path = compute_path(parent_path.as_deref(), &items[idx].id);
            resolved[idx] = Some(path.clone());
            parent_path = Some(path);
        }
    }

    resolved.into_iter().flatten().collect()
}

/// Attaches paths and search documents to an already deduplicated chunk.
pub fn prepare_chunk(
    items: Vec<MessageDraft>,
    persisted: &HashMap<String, String>,
) -> Vec<PreparedMessage> {
    let paths = resolve_paths(&items, persisted);
    items
        .into_iter()
        .zip(paths)
        .map(|(draft, path)| PreparedMessage::new(draft, path))
        .collect()
}
