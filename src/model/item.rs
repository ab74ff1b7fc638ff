use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Item discriminant, as written in the `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Link,
    Snippet,
    Folder,
}

impl ItemType {
    /// Parse the `type` tag of a raw record
    pub fn parse_type(s: &str) -> Option<Self> {
        match s {
            "link" => Some(ItemType::Link),
            "snippet" => Some(ItemType::Snippet),
            "folder" => Some(ItemType::Folder),
            _ => None,
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemType::Link => write!(f, "link"),
            ItemType::Snippet => write!(f, "snippet"),
            ItemType::Folder => write!(f, "folder"),
        }
    }
}

/// Variant-specific fields of an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ItemKind {
    Link {
        url: String,
    },
    Snippet {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    Folder {
        #[serde(rename = "isOpen", default = "default_open")]
        is_open: bool,
    },
}

fn default_open() -> bool {
    true
}

/// A link, snippet or folder in the collection.
///
/// Serialized as one flat JSON object: the common fields plus the `type` tag
/// and the variant's own fields, with camelCase keys. `parentId: null` is the
/// root position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub title: String,
    #[serde(default, deserialize_with = "empty_parent_is_root")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(flatten)]
    pub kind: ItemKind,
}

fn empty_parent_is_root<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|p| !p.is_empty()))
}

impl Item {
    pub fn item_type(&self) -> ItemType {
        match self.kind {
            ItemKind::Link { .. } => ItemType::Link,
            ItemKind::Snippet { .. } => ItemType::Snippet,
            ItemKind::Folder { .. } => ItemType::Folder,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self.kind, ItemKind::Folder { .. })
    }

    /// The url of a link, or the optional url of a snippet
    pub fn url(&self) -> Option<&str> {
        match &self.kind {
            ItemKind::Link { url } => Some(url),
            ItemKind::Snippet { url, .. } => url.as_deref(),
            ItemKind::Folder { .. } => None,
        }
    }

    pub fn content(&self) -> Option<&str> {
        match &self.kind {
            ItemKind::Snippet { content, .. } => Some(content),
            _ => None,
        }
    }

    /// Expansion state; `None` for anything but a folder
    pub fn is_open(&self) -> Option<bool> {
        match self.kind {
            ItemKind::Folder { is_open } => Some(is_open),
            _ => None,
        }
    }
}

/// Variant fields of a not-yet-created item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftKind {
    Link { url: String },
    Snippet { content: String, url: Option<String> },
    Folder { is_open: Option<bool> },
}

/// Input to `add_item`: everything but `id` and `createdAt`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDraft {
    pub title: String,
    pub parent_id: Option<String>,
    pub kind: DraftKind,
}

impl ItemDraft {
    pub fn link(title: impl Into<String>, url: impl Into<String>) -> Self {
        ItemDraft {
            title: title.into(),
            parent_id: None,
            kind: DraftKind::Link { url: url.into() },
        }
    }

    pub fn snippet(title: impl Into<String>, content: impl Into<String>) -> Self {
        ItemDraft {
            title: title.into(),
            parent_id: None,
            kind: DraftKind::Snippet {
                content: content.into(),
                url: None,
            },
        }
    }

    pub fn folder(title: impl Into<String>) -> Self {
        ItemDraft {
            title: title.into(),
            parent_id: None,
            kind: DraftKind::Folder { is_open: None },
        }
    }

    /// Place the draft under `parent_id`
    pub fn under(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }
}

/// Partial update for `update_item`.
///
/// `None` leaves a field alone. Fields that don't exist on the target's
/// variant are ignored. `parent_id: Some(None)` moves the item to root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemPatch {
    pub title: Option<String>,
    pub url: Option<String>,
    pub content: Option<String>,
    pub parent_id: Option<Option<String>>,
    pub is_open: Option<bool>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.url.is_none()
            && self.content.is_none()
            && self.parent_id.is_none()
            && self.is_open.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn folder_serializes_flat_with_camel_case() {
        let item = Item {
            id: "f1".into(),
            title: "Docs".into(),
            parent_id: None,
            created_at: 1_700_000_000_000,
            kind: ItemKind::Folder { is_open: true },
        };
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": "f1",
                "title": "Docs",
                "parentId": null,
                "createdAt": 1_700_000_000_000i64,
                "type": "folder",
                "isOpen": true,
            })
        );
    }

    #[test]
    fn snippet_without_url_omits_it() {
        let item = Item {
            id: "s1".into(),
            title: "Note".into(),
            parent_id: Some("f1".into()),
            created_at: 1,
            kind: ItemKind::Snippet {
                content: "hello".into(),
                url: None,
            },
        };
        let json = serde_json::to_string(&item).unwrap();
        assert!(!json.contains("\"url\""));
        assert!(json.contains("\"parentId\":\"f1\""));
    }

    #[test]
    fn deserialize_defaults_folder_open_and_root_parent() {
        let item: Item =
            serde_json::from_str(r#"{"id":"f","title":"A","type":"folder","createdAt":5}"#)
                .unwrap();
        assert_eq!(item.is_open(), Some(true));
        assert_eq!(item.parent_id, None);
    }

    #[test]
    fn deserialize_empty_parent_is_root() {
        let item: Item = serde_json::from_str(
            r#"{"id":"l","title":"A","type":"link","url":"https://x.com","parentId":""}"#,
        )
        .unwrap();
        assert_eq!(item.parent_id, None);
        assert_eq!(item.url(), Some("https://x.com"));
    }

    #[test]
    fn deserialize_rejects_unknown_type() {
        let result: Result<Item, _> =
            serde_json::from_str(r#"{"id":"x","title":"A","type":"image"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn accessors_follow_variant() {
        let link = Item {
            id: "l".into(),
            title: "L".into(),
            parent_id: None,
            created_at: 0,
            kind: ItemKind::Link {
                url: "https://a.b".into(),
            },
        };
        assert_eq!(link.item_type(), ItemType::Link);
        assert!(!link.is_folder());
        assert_eq!(link.content(), None);
        assert_eq!(link.is_open(), None);
    }

    #[test]
    fn parse_type_tags() {
        assert_eq!(ItemType::parse_type("folder"), Some(ItemType::Folder));
        assert_eq!(ItemType::parse_type("Folder"), None);
        assert_eq!(ItemType::Snippet.to_string(), "snippet");
    }

    #[test]
    fn empty_patch() {
        assert!(ItemPatch::default().is_empty());
        let patch = ItemPatch {
            parent_id: Some(None),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
