use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

use crate::model::item::{Item, ItemKind, ItemType};
use crate::ops::item_ops::{generate_id, now_millis};
use crate::ops::tree;

/// Error type for import operations. Any error rejects the whole batch.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("imported data must be an array of items")]
    NotAnArray,
    #[error("invalid item type at index {index}")]
    InvalidType { index: usize },
    #[error("missing {field} at index {index}")]
    MissingField { index: usize, field: &'static str },
    #[error("import would create a folder loop with folder \"{title}\" ({folder_id})")]
    FolderLoop { folder_id: String, title: String },
}

/// Result of reconciling an import batch
#[derive(Debug)]
pub struct Reconciled {
    /// Items ready to append, in input order
    pub items: Vec<Item>,
    /// Declared ids that were already taken, with the id each got instead
    pub remapped: Vec<(String, String)>,
}

/// Parse pasted or file text into raw candidate records
pub fn parse_import(text: &str) -> Result<Vec<Value>, ImportError> {
    match serde_json::from_str::<Value>(text)? {
        Value::Array(records) => Ok(records),
        _ => Err(ImportError::NotAnArray),
    }
}

/// Validate raw records and turn them into items that can be appended to
/// `existing` without breaking any invariant.
///
/// Declared ids are kept unless missing or already used (by `existing` or an
/// earlier record in the batch); parents pointing at a replaced id follow it
/// to the new one. Forward references are fine since parents are only
/// resolved once every id is final. Dangling parents are left alone.
pub fn reconcile(existing: &[Item], raw: &[Value]) -> Result<Reconciled, ImportError> {
    let mut used: HashSet<String> = existing.iter().map(|i| i.id.clone()).collect();
    let mut id_map: HashMap<String, String> = HashMap::new();
    let mut remapped = Vec::new();
    let mut prepared = Vec::with_capacity(raw.len());

    for (index, record) in raw.iter().enumerate() {
        let obj = record
            .as_object()
            .ok_or(ImportError::InvalidType { index })?;
        let (title, kind) = validate_record(obj, index)?;

        let declared = obj.get("id").and_then(id_value);
        let id = match declared {
            Some(ref d) if !used.contains(d) => d.clone(),
            _ => {
                let fresh = generate_id(|candidate| used.contains(candidate));
                if let Some(old) = declared {
                    id_map.insert(old.clone(), fresh.clone());
                    remapped.push((old, fresh.clone()));
                }
                fresh
            }
        };
        used.insert(id.clone());

        let created_at = obj
            .get("createdAt")
            .and_then(Value::as_i64)
            .filter(|t| *t > 0)
            .unwrap_or_else(now_millis);

        prepared.push(Item {
            id,
            title,
            parent_id: obj.get("parentId").and_then(id_value),
            created_at,
            kind,
        });
    }

    // Parents are rewritten only after every id is settled
    for item in &mut prepared {
        if let Some(new_parent) = item.parent_id.as_ref().and_then(|p| id_map.get(p)) {
            item.parent_id = Some(new_parent.clone());
        }
    }

    let mut prospective: Vec<Item> = existing.to_vec();
    prospective.extend(prepared.iter().cloned());
    for folder in prepared.iter().filter(|i| i.is_folder()) {
        if tree::would_create_loop(&prospective, &folder.id, folder.parent_id.as_deref()) {
            return Err(ImportError::FolderLoop {
                folder_id: folder.id.clone(),
                title: folder.title.clone(),
            });
        }
    }

    Ok(Reconciled {
        items: prepared,
        remapped,
    })
}

/// Check one record in field order: type, title, then the variant's
/// required field. Unknown keys are ignored.
fn validate_record(obj: &Map<String, Value>, index: usize) -> Result<(String, ItemKind), ImportError> {
    let item_type = obj
        .get("type")
        .and_then(Value::as_str)
        .and_then(ItemType::parse_type)
        .ok_or(ImportError::InvalidType { index })?;

    let title = non_empty_str(obj, "title").ok_or(ImportError::MissingField {
        index,
        field: "title",
    })?;

    let kind = match item_type {
        ItemType::Link => ItemKind::Link {
            url: non_empty_str(obj, "url").ok_or(ImportError::MissingField {
                index,
                field: "url",
            })?,
        },
        ItemType::Snippet => ItemKind::Snippet {
            content: non_empty_str(obj, "content").ok_or(ImportError::MissingField {
                index,
                field: "content",
            })?,
            url: non_empty_str(obj, "url"),
        },
        ItemType::Folder => ItemKind::Folder {
            is_open: obj.get("isOpen").and_then(Value::as_bool).unwrap_or(true),
        },
    };

    Ok((title, kind))
}

fn non_empty_str(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// Ids and parent references: non-empty strings, or numbers from hand-written JSON
fn id_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
