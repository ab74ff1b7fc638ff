use std::collections::HashSet;

use indexmap::IndexMap;

use crate::model::item::Item;

/// Union two item lists by id.
///
/// File items win for their id (the first one, if the file repeats an id);
/// memory items are kept only when the file has no item with that id. File
/// order comes first, followed by memory-only items in their memory order.
///
/// This is presence-based only: if the file and memory both hold a version
/// of the same item, the memory version is dropped even when it carries a
/// newer edit.
pub fn merge_items(memory: &[Item], file: &[Item]) -> Vec<Item> {
    let mut merged: IndexMap<&str, &Item> = IndexMap::with_capacity(file.len() + memory.len());
    for item in file.iter().chain(memory) {
        merged.entry(item.id.as_str()).or_insert(item);
    }
    merged.into_values().cloned().collect()
}

/// Keep the first item for each id. Returns the unique items and the
/// repeats that were dropped, both in their original order.
pub fn dedupe_by_id(items: Vec<Item>) -> (Vec<Item>, Vec<Item>) {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .partition(|item| seen.insert(item.id.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::item::ItemKind;
    use pretty_assertions::assert_eq;

    fn snippet(id: &str, content: &str) -> Item {
        Item {
            id: id.into(),
            title: id.into(),
            parent_id: None,
            created_at: 1,
            kind: ItemKind::Snippet {
                content: content.into(),
                url: None,
            },
        }
    }

    #[test]
    fn file_wins_for_shared_ids() {
        let memory = vec![snippet("a", "memory")];
        let file = vec![snippet("a", "file")];
        assert_eq!(merge_items(&memory, &file), vec![snippet("a", "file")]);
    }

    #[test]
    fn memory_only_items_survive_after_file_items() {
        let memory = vec![snippet("m1", "x"), snippet("shared", "old"), snippet("m2", "y")];
        let file = vec![snippet("shared", "new"), snippet("f1", "z")];
        let ids: Vec<String> = merge_items(&memory, &file)
            .into_iter()
            .map(|i| format!("{}:{}", i.id, i.content().unwrap_or("")))
            .collect();
        assert_eq!(ids, vec!["shared:new", "f1:z", "m1:x", "m2:y"]);
    }

    #[test]
    fn repeated_file_ids_keep_the_first_copy() {
        let file = vec![snippet("d", "one"), snippet("d", "two")];
        let merged = merge_items(&[], &file);
        assert_eq!(merged, vec![snippet("d", "one")]);
    }

    #[test]
    fn dedupe_reports_dropped_repeats() {
        let items = vec![snippet("a", "1"), snippet("b", "2"), snippet("a", "3")];
        let (unique, dropped) = dedupe_by_id(items);
        assert_eq!(unique, vec![snippet("a", "1"), snippet("b", "2")]);
        assert_eq!(dropped, vec![snippet("a", "3")]);
    }

    #[test]
    fn empty_file_keeps_memory() {
        let memory = vec![snippet("a", "1")];
        assert_eq!(merge_items(&memory, &[]), memory);
    }
}
