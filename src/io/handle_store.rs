use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::io::recovery::atomic_write;

/// Key the attached data file is remembered under
pub const DATA_FILE_HANDLE: &str = "data-file-handle";

/// A remembered file grant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandleEntry {
    pub key: String,
    pub path: String,
    pub granted: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct HandleTable {
    #[serde(default)]
    handles: Vec<HandleEntry>,
}

/// Durable store for file handles, kept apart from the item cache in
/// `<data>/handles.toml`.
#[derive(Debug, Clone)]
pub struct HandleStore {
    path: PathBuf,
}

impl HandleStore {
    pub fn new(data_dir: &Path) -> Self {
        HandleStore {
            path: data_dir.join("handles.toml"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<HandleEntry> {
        read_table(&self.path)
            .handles
            .into_iter()
            .find(|h| h.key == key)
    }

    /// Remember `path` under `key`, replacing any previous grant.
    pub fn put(&self, key: &str, path: &Path) -> Result<(), std::io::Error> {
        let mut table = read_table(&self.path);
        let entry = HandleEntry {
            key: key.to_string(),
            path: path.to_string_lossy().to_string(),
            granted: Utc::now(),
        };
        match table.handles.iter_mut().find(|h| h.key == key) {
            Some(existing) => *existing = entry,
            None => table.handles.push(entry),
        }
        write_table(&self.path, &table)
    }
}

/// Read the table. A missing file is empty; a corrupted one is backed up
/// as .bak and treated as empty.
fn read_table(path: &Path) -> HandleTable {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return HandleTable::default(),
    };
    match toml::from_str::<HandleTable>(&content) {
        Ok(table) => table,
        Err(e) => {
            let bak = path.with_extension("toml.bak");
            let _ = fs::copy(path, &bak);
            log::warn!(
                "event=handle_store_read status=corrupt path={} backup={} error={}",
                path.display(),
                bak.display(),
                e
            );
            HandleTable::default()
        }
    }
}

fn write_table(path: &Path, table: &HandleTable) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(table).map_err(|e| std::io::Error::other(e.to_string()))?;
    atomic_write(path, content.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn put_and_get() {
        let tmp = TempDir::new().unwrap();
        let store = HandleStore::new(tmp.path());
        assert!(store.get(DATA_FILE_HANDLE).is_none());

        store.put(DATA_FILE_HANDLE, Path::new("/tmp/a.json")).unwrap();
        let entry = store.get(DATA_FILE_HANDLE).unwrap();
        assert_eq!(entry.path, "/tmp/a.json");
        assert!(store.get("other").is_none());
    }

    #[test]
    fn put_replaces_existing_key() {
        let tmp = TempDir::new().unwrap();
        let store = HandleStore::new(tmp.path());
        store.put(DATA_FILE_HANDLE, Path::new("/tmp/a.json")).unwrap();
        store.put(DATA_FILE_HANDLE, Path::new("/tmp/b.json")).unwrap();

        let table = read_table(store.path());
        assert_eq!(table.handles.len(), 1);
        assert_eq!(table.handles[0].path, "/tmp/b.json");
    }

    #[test]
    fn corrupt_store_is_backed_up() {
        let tmp = TempDir::new().unwrap();
        let store = HandleStore::new(tmp.path());
        fs::write(store.path(), "this is [not valid toml").unwrap();

        assert!(store.get(DATA_FILE_HANDLE).is_none());
        let bak = tmp.path().join("handles.toml.bak");
        assert_eq!(
            fs::read_to_string(bak).unwrap(),
            "this is [not valid toml"
        );

        store.put(DATA_FILE_HANDLE, Path::new("/tmp/c.json")).unwrap();
        assert_eq!(store.get(DATA_FILE_HANDLE).unwrap().path, "/tmp/c.json");
    }
}
