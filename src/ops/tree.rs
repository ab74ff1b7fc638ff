//! Folder-tree queries over the flat item list.
//!
//! Items reference their parent by id; there are no owning pointers between
//! nodes. Everything here is read-only and tolerates corrupt input: dangling
//! parents behave like root and walks stop on repeated nodes.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::Serialize;

use crate::model::item::Item;

/// True for the root position (`None`, or an empty reference from hand-edited data)
pub fn is_root(parent_id: Option<&str>) -> bool {
    parent_id.is_none_or(str::is_empty)
}

/// Find an item by id
pub fn find<'a>(items: &'a [Item], id: &str) -> Option<&'a Item> {
    items.iter().find(|i| i.id == id)
}

/// Would making `candidate_parent` the parent of `folder_id` put the folder
/// inside its own subtree?
pub fn would_create_loop(items: &[Item], folder_id: &str, candidate_parent: Option<&str>) -> bool {
    let Some(start) = candidate_parent.filter(|p| !p.is_empty()) else {
        return false;
    };
    if start == folder_id {
        return true;
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut current = Some(start);
    while let Some(id) = current.filter(|c| !c.is_empty()) {
        // Already-corrupt data: the chain loops without reaching folder_id
        if !visited.insert(id) {
            return true;
        }
        if id == folder_id {
            return true;
        }
        current = find(items, id).and_then(|parent| parent.parent_id.as_deref());
    }
    false
}

/// Every descendant id of `id`: direct children, and recursively the
/// children of descendant folders. The target itself is not included.
pub fn all_child_ids(items: &[Item], id: &str) -> HashSet<String> {
    let mut out = HashSet::new();
    collect_children(items, id, &mut out);
    out
}

fn collect_children(items: &[Item], parent: &str, out: &mut HashSet<String>) {
    for child in items
        .iter()
        .filter(|i| i.parent_id.as_deref() == Some(parent))
    {
        if !out.insert(child.id.clone()) {
            continue;
        }
        if child.is_folder() {
            collect_children(items, &child.id, out);
        }
    }
}

/// The parent an item is rendered under: its `parent_id` when that names an
/// existing folder, otherwise root.
pub fn effective_parent<'a>(items: &'a [Item], item: &'a Item) -> Option<&'a str> {
    let parent = item.parent_id.as_deref().filter(|p| !p.is_empty())?;
    match find(items, parent) {
        Some(p) if p.is_folder() => Some(parent),
        _ => None,
    }
}

/// Items shown directly under `parent`: folders first, then everything else,
/// each group ordered by title.
pub fn children<'a>(items: &'a [Item], parent: Option<&str>) -> Vec<&'a Item> {
    let mut out: Vec<&Item> = items
        .iter()
        .filter(|i| effective_parent(items, i) == parent.filter(|p| !p.is_empty()))
        .filter(|i| Some(i.id.as_str()) != parent)
        .collect();
    out.sort_by(|a, b| match (a.is_folder(), b.is_folder()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => compare_titles(&a.title, &b.title),
    });
    out
}

fn compare_titles(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// One entry of a parent-folder picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderOption {
    /// Folder id, `None` for root
    pub value: Option<String>,
    /// Title indented two spaces per level
    pub label: String,
    pub depth: usize,
}

/// Root plus every folder, depth-first with siblings ordered by title.
///
/// `exclude` drops a folder and therefore its whole subtree, which leaves
/// only parents that can't create a loop when moving that folder.
pub fn folder_options(items: &[Item], exclude: Option<&str>) -> Vec<FolderOption> {
    let mut options = vec![FolderOption {
        value: None,
        label: "Root".to_string(),
        depth: 0,
    }];
    push_folder_options(items, None, exclude, 0, &mut options);
    options
}

fn push_folder_options(
    items: &[Item],
    parent: Option<&str>,
    exclude: Option<&str>,
    depth: usize,
    out: &mut Vec<FolderOption>,
) {
    let mut folders: Vec<&Item> = items
        .iter()
        .filter(|i| i.is_folder() && Some(i.id.as_str()) != exclude)
        .filter(|i| effective_parent(items, i) == parent)
        .filter(|i| Some(i.id.as_str()) != parent)
        .collect();
    folders.sort_by(|a, b| compare_titles(&a.title, &b.title));

    for folder in folders {
        out.push(FolderOption {
            value: Some(folder.id.clone()),
            label: format!("{}{}", "  ".repeat(depth), folder.title),
            depth,
        });
        push_folder_options(items, Some(&folder.id), exclude, depth + 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::item::ItemKind;
    use pretty_assertions::assert_eq;

    fn folder(id: &str, parent: Option<&str>) -> Item {
        Item {
            id: id.into(),
            title: id.to_uppercase(),
            parent_id: parent.map(String::from),
            created_at: 0,
            kind: ItemKind::Folder { is_open: true },
        }
    }

    fn link(id: &str, parent: Option<&str>) -> Item {
        Item {
            id: id.into(),
            title: id.to_uppercase(),
            parent_id: parent.map(String::from),
            created_at: 0,
            kind: ItemKind::Link {
                url: format!("https://{}.example", id),
            },
        }
    }

    fn sorted(set: HashSet<String>) -> Vec<String> {
        let mut v: Vec<String> = set.into_iter().collect();
        v.sort();
        v
    }

    #[test]
    fn root_never_loops() {
        let items = vec![folder("a", None)];
        assert!(!would_create_loop(&items, "a", None));
        assert!(!would_create_loop(&items, "a", Some("")));
    }

    #[test]
    fn own_parent_loops() {
        let items = vec![folder("f1", None)];
        assert!(would_create_loop(&items, "f1", Some("f1")));
    }

    #[test]
    fn moving_under_own_child_loops() {
        let items = vec![folder("f1", None), folder("f2", Some("f1"))];
        assert!(would_create_loop(&items, "f1", Some("f2")));
        assert!(!would_create_loop(&items, "f2", Some("f1")));
    }

    #[test]
    fn moving_under_deep_descendant_loops() {
        let items = vec![
            folder("a", None),
            folder("b", Some("a")),
            folder("c", Some("b")),
            folder("d", None),
        ];
        assert!(would_create_loop(&items, "a", Some("c")));
        assert!(!would_create_loop(&items, "d", Some("c")));
    }

    #[test]
    fn dangling_candidate_does_not_loop() {
        let items = vec![folder("a", None)];
        assert!(!would_create_loop(&items, "a", Some("missing")));
    }

    #[test]
    fn corrupt_cycle_is_reported_without_hanging() {
        // x and y already point at each other
        let items = vec![folder("x", Some("y")), folder("y", Some("x")), folder("z", None)];
        assert!(would_create_loop(&items, "z", Some("x")));
    }

    #[test]
    fn child_ids_recurse_through_folders() {
        let items = vec![
            folder("a", None),
            folder("b", Some("a")),
            link("l1", Some("a")),
            link("l2", Some("b")),
            folder("c", Some("b")),
            link("l3", Some("c")),
            link("other", None),
        ];
        assert_eq!(
            sorted(all_child_ids(&items, "a")),
            vec!["b", "c", "l1", "l2", "l3"]
        );
        assert_eq!(sorted(all_child_ids(&items, "c")), vec!["l3"]);
        assert!(all_child_ids(&items, "l1").is_empty());
        assert!(all_child_ids(&items, "missing").is_empty());
    }

    #[test]
    fn child_ids_terminate_on_cycles() {
        let items = vec![folder("x", Some("y")), folder("y", Some("x"))];
        assert_eq!(sorted(all_child_ids(&items, "x")), vec!["x", "y"]);
    }

    #[test]
    fn effective_parent_treats_dangling_and_non_folders_as_root() {
        let items = vec![
            folder("f", None),
            link("in", Some("f")),
            link("lost", Some("nope")),
            link("under_link", Some("in")),
        ];
        assert_eq!(effective_parent(&items, &items[1]), Some("f"));
        assert_eq!(effective_parent(&items, &items[2]), None);
        assert_eq!(effective_parent(&items, &items[3]), None);
    }

    #[test]
    fn children_lists_folders_first_by_title() {
        let mut items = vec![
            link("zeta", None),
            folder("beta", None),
            link("alpha", None),
            folder("alpha_folder", None),
            link("lost", Some("gone")),
        ];
        items[3].title = "Alpha".into();
        let ids: Vec<&str> = children(&items, None).iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["alpha_folder", "beta", "alpha", "lost", "zeta"]);
    }

    #[test]
    fn folder_options_indent_and_exclude_subtree() {
        let items = vec![
            folder("work", None),
            folder("docs", Some("work")),
            folder("api", Some("docs")),
            folder("home", None),
            link("l", Some("work")),
        ];
        let labels: Vec<String> = folder_options(&items, None)
            .into_iter()
            .map(|o| o.label)
            .collect();
        assert_eq!(labels, vec!["Root", "HOME", "WORK", "  DOCS", "    API"]);

        let labels: Vec<String> = folder_options(&items, Some("docs"))
            .into_iter()
            .map(|o| o.label)
            .collect();
        assert_eq!(labels, vec!["Root", "HOME", "WORK"]);
    }

    #[test]
    fn is_root_accepts_empty_reference() {
        assert!(is_root(None));
        assert!(is_root(Some("")));
        assert!(!is_root(Some("f1")));
    }
}
