use std::collections::HashSet;

use crate::model::item::{DraftKind, Item, ItemDraft, ItemKind, ItemPatch};
use crate::ops::tree;

/// Error type for item operations
#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    #[error("folder \"{title}\" ({folder_id}) cannot be placed inside itself or its own subfolders")]
    FolderLoop { folder_id: String, title: String },
    #[error("item not found: {0}")]
    NotFound(String),
    #[error("{field} is required and cannot be empty")]
    MissingField { field: &'static str },
}

// ---------------------------------------------------------------------------
// Ids and timestamps
// ---------------------------------------------------------------------------

/// Generate an id for which `taken` returns false.
pub fn generate_id(taken: impl Fn(&str) -> bool) -> String {
    loop {
        let id = uuid::Uuid::new_v4().simple().to_string();
        if !taken(&id) {
            return id;
        }
    }
}

/// Current time in epoch milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// Validate a draft, give it an id and creation time, and append it.
/// Folders default to open.
pub fn add_item(items: &mut Vec<Item>, draft: ItemDraft) -> Result<Item, ItemError> {
    let title = required(draft.title, "title")?;
    let kind = match draft.kind {
        DraftKind::Link { url } => ItemKind::Link {
            url: required(url, "url")?,
        },
        DraftKind::Snippet { content, url } => ItemKind::Snippet {
            content: required(content, "content")?,
            url: optional(url),
        },
        DraftKind::Folder { is_open } => ItemKind::Folder {
            is_open: is_open.unwrap_or(true),
        },
    };
    let parent_id = draft.parent_id.filter(|p| !p.trim().is_empty());

    let taken: HashSet<&str> = items.iter().map(|i| i.id.as_str()).collect();
    let id = generate_id(|candidate| taken.contains(candidate));

    let item = Item {
        id,
        title,
        parent_id,
        created_at: now_millis(),
        kind,
    };

    if item.is_folder() && tree::would_create_loop(items, &item.id, item.parent_id.as_deref()) {
        return Err(ItemError::FolderLoop {
            folder_id: item.id,
            title: item.title,
        });
    }

    items.push(item.clone());
    Ok(item)
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

/// Apply a partial update. `id` and type never change. Nothing is modified
/// unless the whole patch is valid.
pub fn update_item(items: &mut [Item], id: &str, patch: ItemPatch) -> Result<Item, ItemError> {
    let idx = items
        .iter()
        .position(|i| i.id == id)
        .ok_or_else(|| ItemError::NotFound(id.to_string()))?;

    let mut updated = items[idx].clone();

    if let Some(title) = patch.title {
        updated.title = required(title, "title")?;
    }

    match &mut updated.kind {
        ItemKind::Link { url } => {
            if let Some(new_url) = patch.url {
                *url = required(new_url, "url")?;
            }
        }
        ItemKind::Snippet { content, url } => {
            if let Some(new_content) = patch.content {
                *content = required(new_content, "content")?;
            }
            if let Some(new_url) = patch.url {
                *url = optional(Some(new_url));
            }
        }
        ItemKind::Folder { is_open } => {
            if let Some(open) = patch.is_open {
                *is_open = open;
            }
        }
    }

    if let Some(new_parent) = patch.parent_id {
        let new_parent = new_parent.filter(|p| !p.trim().is_empty());
        if updated.is_folder() && tree::would_create_loop(items, &updated.id, new_parent.as_deref())
        {
            return Err(ItemError::FolderLoop {
                folder_id: updated.id,
                title: updated.title,
            });
        }
        updated.parent_id = new_parent;
    }

    items[idx] = updated.clone();
    Ok(updated)
}

// ---------------------------------------------------------------------------
// Delete / toggle
// ---------------------------------------------------------------------------

/// Remove an item together with every descendant. Returns what was removed,
/// in collection order; empty if `id` doesn't exist.
pub fn delete_item(items: &mut Vec<Item>, id: &str) -> Vec<Item> {
    if tree::find(items, id).is_none() {
        return Vec::new();
    }
    let mut doomed = tree::all_child_ids(items, id);
    doomed.insert(id.to_string());

    let (removed, kept): (Vec<Item>, Vec<Item>) =
        std::mem::take(items).into_iter().partition(|i| doomed.contains(&i.id));
    *items = kept;
    removed
}

/// Flip a folder's open state. Returns the new state, or `None` when `id`
/// is missing or not a folder.
pub fn toggle_folder(items: &mut [Item], id: &str) -> Option<bool> {
    let item = items.iter_mut().find(|i| i.id == id)?;
    match &mut item.kind {
        ItemKind::Folder { is_open } => {
            *is_open = !*is_open;
            Some(*is_open)
        }
        _ => None,
    }
}

/// Whitespace-only counts as missing; anything else is stored as given,
/// the same as imported records.
fn required(value: String, field: &'static str) -> Result<String, ItemError> {
    if value.trim().is_empty() {
        return Err(ItemError::MissingField { field });
    }
    Ok(value)
}

fn optional(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
