use indexmap::IndexMap;
use serde::Serialize;

use crate::model::item::{Item, ItemKind};
use crate::ops::tree;

/// Structured result from `sc check`, suitable for --json output.
#[derive(Debug, Default, Serialize)]
pub struct CheckResult {
    pub valid: bool,
    pub errors: Vec<CheckError>,
    pub warnings: Vec<CheckWarning>,
}

/// A structural error (the collection breaks an invariant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum CheckError {
    /// The same id is used by more than one item
    #[serde(rename = "duplicate_id")]
    DuplicateId { item_id: String, count: usize },
    /// A folder is its own ancestor, or hangs below a loop
    #[serde(rename = "folder_loop")]
    FolderLoop { folder_id: String, title: String },
}

/// A non-critical issue. Readers cope with these, but the data is off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum CheckWarning {
    /// Parent id doesn't exist; the item shows at root
    #[serde(rename = "dangling_parent")]
    DanglingParent { item_id: String, parent_id: String },
    /// Parent exists but isn't a folder; the item shows at root
    #[serde(rename = "parent_not_folder")]
    ParentNotFolder { item_id: String, parent_id: String },
    /// A required field is blank (usually a hand-edited data file)
    #[serde(rename = "empty_field")]
    EmptyField { item_id: String, field: String },
}

// ---------------------------------------------------------------------------
// Main check entry point
// ---------------------------------------------------------------------------

/// Validate a collection and return structured results.
///
/// This is a read-only operation. Checks performed:
/// 1. No duplicate ids
/// 2. No folder is its own ancestor
/// 3. Warnings for parents that are missing or not folders
/// 4. Warnings for blank titles, link urls and snippet contents
pub fn check_items(items: &[Item]) -> CheckResult {
    let mut result = CheckResult::default();

    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for item in items {
        *counts.entry(item.id.as_str()).or_insert(0) += 1;
    }
    for (id, count) in counts.iter().filter(|(_, c)| **c > 1) {
        result.errors.push(CheckError::DuplicateId {
            item_id: id.to_string(),
            count: *count,
        });
    }

    for item in items {
        check_item(items, item, &mut result);
    }

    result.valid = result.errors.is_empty();
    result
}

fn check_item(items: &[Item], item: &Item, result: &mut CheckResult) {
    if item.is_folder() && tree::would_create_loop(items, &item.id, item.parent_id.as_deref()) {
        result.errors.push(CheckError::FolderLoop {
            folder_id: item.id.clone(),
            title: item.title.clone(),
        });
    }

    if let Some(parent_id) = item.parent_id.as_deref().filter(|p| !p.is_empty()) {
        match tree::find(items, parent_id) {
            None => result.warnings.push(CheckWarning::DanglingParent {
                item_id: item.id.clone(),
                parent_id: parent_id.to_string(),
            }),
            Some(parent) if !parent.is_folder() => {
                result.warnings.push(CheckWarning::ParentNotFolder {
                    item_id: item.id.clone(),
                    parent_id: parent_id.to_string(),
                })
            }
            Some(_) => {}
        }
    }

    let mut blank = |field: &str| {
        result.warnings.push(CheckWarning::EmptyField {
            item_id: item.id.clone(),
            field: field.to_string(),
        })
    };
    if item.title.trim().is_empty() {
        blank("title");
    }
    match &item.kind {
        ItemKind::Link { url } if url.trim().is_empty() => blank("url"),
        ItemKind::Snippet { content, .. } if content.trim().is_empty() => blank("content"),
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
