use chrono::{DateTime, Utc};
use serde::Serialize;
use unicode_width::UnicodeWidthStr;

use crate::model::item::{Item, ItemKind};
use crate::ops::tree;
use crate::store::PollOutcome;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

/// An item with the items shown under it
#[derive(Serialize)]
pub struct ItemTreeJson {
    #[serde(flatten)]
    pub item: Item,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ItemTreeJson>,
}

#[derive(Serialize)]
pub struct SearchHitJson {
    pub id: String,
    pub title: String,
    pub field: String,
}

#[derive(Serialize)]
pub struct RemapJson {
    pub from: String,
    pub to: String,
}

#[derive(Serialize)]
pub struct ImportJson {
    pub imported: Vec<Item>,
    pub remapped: Vec<RemapJson>,
}

#[derive(Serialize)]
pub struct DeleteJson {
    pub removed: Vec<String>,
}

#[derive(Serialize)]
pub struct StatusJson {
    pub data_dir: String,
    pub cache: String,
    pub items: usize,
    pub attached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_modified: Option<String>,
    pub needs_file: bool,
    pub poll_interval_ms: u64,
}

#[derive(Serialize)]
pub struct WatchEventJson<'a> {
    pub tick: u64,
    #[serde(flatten)]
    pub outcome: &'a PollOutcome,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// The tree under `parent`, ordered the way it is listed
pub fn tree_to_json(items: &[Item], parent: Option<&str>) -> Vec<ItemTreeJson> {
    tree::children(items, parent)
        .into_iter()
        .map(|item| ItemTreeJson {
            item: item.clone(),
            children: if item.is_folder() {
                tree_to_json(items, Some(&item.id))
            } else {
                Vec::new()
            },
        })
        .collect()
}

pub fn millis_to_string(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .unwrap_or_else(|| millis.to_string())
}

pub fn system_time_to_string(time: std::time::SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

fn marker(item: &Item) -> char {
    match item.kind {
        ItemKind::Folder { is_open: true } => 'v',
        ItemKind::Folder { is_open: false } => '>',
        ItemKind::Link { .. } => '@',
        ItemKind::Snippet { .. } => '#',
    }
}

/// Render the tree under `parent` as indented lines with ids in a column.
/// Closed folders are collapsed unless `expand_all`.
pub fn format_tree(items: &[Item], parent: Option<&str>, expand_all: bool) -> Vec<String> {
    let mut rows: Vec<(String, &str)> = Vec::new();
    collect_rows(items, parent, 0, expand_all, &mut rows);

    let width = rows
        .iter()
        .map(|(label, _)| UnicodeWidthStr::width(label.as_str()))
        .max()
        .unwrap_or(0);
    rows.into_iter()
        .map(|(label, id)| {
            let pad = width - UnicodeWidthStr::width(label.as_str());
            format!("{}{}  {}", label, " ".repeat(pad), id)
        })
        .collect()
}

fn collect_rows<'a>(
    items: &'a [Item],
    parent: Option<&str>,
    depth: usize,
    expand_all: bool,
    rows: &mut Vec<(String, &'a str)>,
) {
    for item in tree::children(items, parent) {
        let mut label = format!("{}{} {}", "  ".repeat(depth), marker(item), item.title);
        let hidden = match item.kind {
            ItemKind::Folder { is_open } => !is_open && !expand_all,
            _ => false,
        };
        if hidden {
            let count = tree::all_child_ids(items, &item.id).len();
            if count > 0 {
                label.push_str(&format!(" ({})", count));
            }
        }
        rows.push((label, item.id.as_str()));
        if item.is_folder() && !hidden {
            collect_rows(items, Some(&item.id), depth + 1, expand_all, rows);
        }
    }
}

/// One-line summary used after mutations and in search results
pub fn format_item_line(item: &Item) -> String {
    format!("{} {} {}", marker(item), item.id, item.title)
}

/// Everything about one item
pub fn format_item_detail(item: &Item, items: &[Item]) -> Vec<String> {
    let mut lines = vec![format!("{} {}", marker(item), item.title)];
    lines.push(format!("id: {}", item.id));
    lines.push(format!("type: {}", item.item_type()));

    let parent = match tree::effective_parent(items, item) {
        Some(pid) => tree::find(items, pid)
            .map(|p| format!("{} ({})", p.title, p.id))
            .unwrap_or_else(|| pid.to_string()),
        None => match item.parent_id.as_deref() {
            Some(dangling) => format!("root (missing parent {})", dangling),
            None => "root".to_string(),
        },
    };
    lines.push(format!("parent: {}", parent));
    lines.push(format!("created: {}", millis_to_string(item.created_at)));

    match &item.kind {
        ItemKind::Link { url } => lines.push(format!("url: {}", url)),
        ItemKind::Snippet { content, url } => {
            if let Some(url) = url {
                lines.push(format!("url: {}", url));
            }
            lines.push("content:".to_string());
            for line in content.lines() {
                lines.push(format!("  {}", line));
            }
        }
        ItemKind::Folder { is_open } => {
            lines.push(format!("open: {}", is_open));
            lines.push(format!(
                "contains: {}",
                tree::all_child_ids(items, &item.id).len()
            ));
        }
    }
    lines
}

pub fn format_poll_outcome(outcome: &PollOutcome) -> Option<String> {
    match outcome {
        PollOutcome::Merged { from_file, kept } => Some(format!(
            "merged {} item(s) from file, kept {} local-only",
            from_file, kept
        )),
        PollOutcome::Unparseable => {
            Some("data file changed but could not be parsed".to_string())
        }
        PollOutcome::Failed { error } => Some(format!("poll failed: {}", error)),
        PollOutcome::Detached => Some("no data file attached".to_string()),
        PollOutcome::Unchanged => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn item(id: &str, title: &str, parent: Option<&str>, kind: ItemKind) -> Item {
        Item {
            id: id.into(),
            title: title.into(),
            parent_id: parent.map(String::from),
            created_at: 0,
            kind,
        }
    }

    fn sample() -> Vec<Item> {
        vec![
            item("l1", "Zed", None, ItemKind::Link { url: "https://z".into() }),
            item("f1", "Work", None, ItemKind::Folder { is_open: true }),
            item(
                "s1",
                "Café",
                Some("f1"),
                ItemKind::Snippet {
                    content: "a\nb".into(),
                    url: None,
                },
            ),
            item("f2", "Archive", None, ItemKind::Folder { is_open: false }),
            item("l2", "Old", Some("f2"), ItemKind::Link { url: "https://o".into() }),
        ]
    }

    #[test]
    fn tree_lists_folders_first_and_aligns_ids() {
        let lines = format_tree(&sample(), None, false);
        assert_eq!(
            lines,
            vec![
                "> Archive (1)  f2",
                "v Work         f1",
                "  # Café       s1",
                "@ Zed          l1",
            ]
        );
    }

    #[test]
    fn expand_all_opens_closed_folders() {
        let lines = format_tree(&sample(), None, true);
        assert_eq!(lines.len(), 5);
        assert!(lines[1].starts_with("  @ Old"));
    }

    #[test]
    fn detail_shows_parent_and_content() {
        let items = sample();
        let lines = format_item_detail(&items[2], &items);
        assert!(lines.contains(&"parent: Work (f1)".to_string()));
        assert!(lines.contains(&"  b".to_string()));
        assert!(lines.contains(&"created: 1970-01-01T00:00:00Z".to_string()));
    }

    #[test]
    fn tree_json_nests_children() {
        let json = serde_json::to_value(tree_to_json(&sample(), None)).unwrap();
        assert_eq!(json[1]["id"], "f1");
        assert_eq!(json[1]["children"][0]["id"], "s1");
        assert!(json[2].get("children").is_none());
    }
}
