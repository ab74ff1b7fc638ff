use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::io::recovery::atomic_write;
use crate::model::item::Item;

/// Error type for the local cache
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("local storage unavailable: {reason}")]
    Unavailable { reason: String },
}

impl CacheError {
    fn unavailable(reason: impl ToString) -> Self {
        CacheError::Unavailable {
            reason: reason.to_string(),
        }
    }
}

/// Per-user key-value cache holding the whole item list under one key.
///
/// Lives at `<data>/cache/<key>.json`. Always written, attached file or not,
/// so the collection survives losing access to the data file.
#[derive(Debug, Clone)]
pub struct LocalCache {
    dir: PathBuf,
    key: String,
    quota_bytes: u64,
}

impl LocalCache {
    pub fn new(data_dir: &Path, key: &str, quota_bytes: u64) -> Self {
        LocalCache {
            dir: data_dir.join("cache"),
            key: key.to_string(),
            quota_bytes,
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.key))
    }

    /// Probe that the cache can be written: create the directory, then write
    /// and remove a test entry.
    pub fn is_available(&self) -> bool {
        self.probe().is_ok()
    }

    fn probe(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let test = self.dir.join("__storage_test__");
        fs::write(&test, b"__storage_test__")?;
        fs::remove_file(&test)
    }

    /// Load the cached list. A missing or unreadable cache is an empty list.
    pub fn load(&self) -> Vec<Item> {
        let path = self.path();
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                log::warn!(
                    "event=cache_read status=error path={} error={}",
                    path.display(),
                    e
                );
                return Vec::new();
            }
        };
        match serde_json::from_str::<Vec<Item>>(&content) {
            Ok(items) => {
                log::debug!("event=cache_read status=ok items={}", items.len());
                items
            }
            Err(e) => {
                log::warn!(
                    "event=cache_read status=parse_error path={} error={}",
                    path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    /// Replace the cached list. Refuses payloads over the quota.
    pub fn save(&self, items: &[Item]) -> Result<(), CacheError> {
        self.probe().map_err(CacheError::unavailable)?;
        let json = serde_json::to_string(items).map_err(CacheError::unavailable)?;
        if json.len() as u64 > self.quota_bytes {
            return Err(CacheError::unavailable(format!(
                "quota exceeded ({} bytes, limit {})",
                json.len(),
                self.quota_bytes
            )));
        }
        atomic_write(&self.path(), json.as_bytes()).map_err(CacheError::unavailable)?;
        log::debug!("event=cache_write status=ok items={}", items.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::item::ItemKind;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn link(id: &str) -> Item {
        Item {
            id: id.into(),
            title: "Example".into(),
            parent_id: None,
            created_at: 10,
            kind: ItemKind::Link {
                url: "https://example.com".into(),
            },
        }
    }

    #[test]
    fn save_then_load() {
        let tmp = TempDir::new().unwrap();
        let cache = LocalCache::new(tmp.path(), "shortcuts-items", 1024);
        assert!(cache.is_available());
        let items = vec![link("a"), link("b")];
        cache.save(&items).unwrap();
        assert_eq!(cache.load(), items);
        assert!(tmp.path().join("cache/shortcuts-items.json").exists());
    }

    #[test]
    fn missing_or_corrupt_cache_is_empty() {
        let tmp = TempDir::new().unwrap();
        let cache = LocalCache::new(tmp.path(), "k", 1024);
        assert!(cache.load().is_empty());

        fs::create_dir_all(tmp.path().join("cache")).unwrap();
        fs::write(cache.path(), "{not json").unwrap();
        assert!(cache.load().is_empty());
    }

    #[test]
    fn over_quota_is_refused_and_previous_value_kept() {
        let tmp = TempDir::new().unwrap();
        let cache = LocalCache::new(tmp.path(), "k", 200);
        cache.save(&[link("a")]).unwrap();

        let many: Vec<Item> = (0..20).map(|i| link(&i.to_string())).collect();
        let err = cache.save(&many).unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
        assert_eq!(cache.load(), vec![link("a")]);
    }

    #[test]
    fn unwritable_location_is_unavailable() {
        let tmp = TempDir::new().unwrap();
        // A file where the cache directory should be
        fs::write(tmp.path().join("cache"), "").unwrap();
        let cache = LocalCache::new(tmp.path(), "k", 1024);
        assert!(!cache.is_available());
        assert!(matches!(
            cache.save(&[link("a")]),
            Err(CacheError::Unavailable { .. })
        ));
    }
}
