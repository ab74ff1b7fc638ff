//! The storage coordinator.
//!
//! `Store` owns the canonical item list. Every mutation goes through it:
//! validate, change memory, then write the whole list to the local cache and,
//! when a data file is attached, to the file. Changes made to the file by
//! other programs come back in through `poll_once` (or a `Session`'s poll
//! thread) and are merged by id.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use serde::Serialize;
use serde_json::Value;

use crate::io::cache::LocalCache;
use crate::io::file_backend::{ExternalFile, FileError, RawSnapshot};
use crate::io::host::FileHost;
use crate::io::recovery::{self, RecoveryCategory, RecoveryEntry};
use crate::model::config::Config;
use crate::model::item::{Item, ItemDraft, ItemPatch};
use crate::ops::import::{self, ImportError, Reconciled};
use crate::ops::item_ops::{self, ItemError};
use crate::ops::merge::{dedupe_by_id, merge_items};
use crate::ops::tree;

/// Error type for coordinator operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Item(#[from] ItemError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    File(#[from] FileError),
}

/// What a passive notice is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// The local cache can't be written; changes last only this session
    StorageUnavailable,
    /// The data file couldn't be written; the cache still has the change
    FileWriteFailed,
    /// The data file couldn't be read
    FileReadFailed,
    /// The data file holds something that isn't an item list
    FileUnparseable,
    /// The data file repeats item ids; only the first of each was kept
    FileDuplicateIds,
}

/// A non-blocking message for the user about degraded storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

/// Result of one poll of the data file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PollOutcome {
    /// No file attached
    Detached,
    /// Stamp hasn't moved
    Unchanged,
    /// External changes were merged into memory
    Merged { from_file: usize, kept: usize },
    /// The file changed but doesn't parse
    Unparseable,
    /// The file couldn't be checked or read
    Failed { error: String },
}

/// What a poll needs to read the file without holding the store
#[derive(Clone)]
pub struct PollTarget {
    file: Arc<dyn ExternalFile>,
    since: Option<SystemTime>,
}

/// What a poll read
pub enum Fetched {
    Unchanged,
    Changed(RawSnapshot),
    Failed(FileError),
}

impl PollTarget {
    /// Check the stamp and, if it moved, read the contents.
    pub fn fetch(&self) -> Fetched {
        let modified = match self.file.modified() {
            Ok(m) => m,
            Err(e) => return Fetched::Failed(e),
        };
        if self.since.is_some_and(|since| modified <= since) {
            return Fetched::Unchanged;
        }
        match self.file.read_raw() {
            Ok(raw) => Fetched::Changed(raw),
            Err(e) => Fetched::Failed(e),
        }
    }
}

/// Owner of the canonical collection and its persistence
pub struct Store {
    items: Vec<Item>,
    data_dir: PathBuf,
    config: Config,
    cache: LocalCache,
    host: Box<dyn FileHost>,
    file: Option<Arc<dyn ExternalFile>>,
    last_modified: Option<SystemTime>,
    last_parse_failure: Option<SystemTime>,
    needs_file: bool,
    poll_failing: bool,
    notices: Vec<Notice>,
}

impl Store {
    /// Load the initial collection.
    ///
    /// A remembered data file that can be read is authoritative. Otherwise
    /// the local cache is used, and `needs_file` is raised when the host
    /// could attach a file.
    pub fn open(data_dir: &Path, config: &Config, host: Box<dyn FileHost>) -> Store {
        if let Err(e) = std::fs::create_dir_all(data_dir) {
            log::warn!(
                "event=data_dir_create status=error path={} error={}",
                data_dir.display(),
                e
            );
        }
        let cache = LocalCache::new(
            data_dir,
            &config.storage.cache_key,
            config.storage.quota_bytes,
        );
        let mut store = Store {
            items: Vec::new(),
            data_dir: data_dir.to_path_buf(),
            config: config.clone(),
            cache,
            host,
            file: None,
            last_modified: None,
            last_parse_failure: None,
            needs_file: false,
            poll_failing: false,
            notices: Vec::new(),
        };

        if !store.cache.is_available() {
            store.notice(
                NoticeKind::StorageUnavailable,
                "local storage is unavailable; changes will not survive this session",
            );
        }

        if !store.files_supported() {
            store.items = store.cache.load();
            log::info!(
                "event=store_open source=cache items={}",
                store.items.len()
            );
            return store;
        }

        let Some(file) = store.host.stored_handle() else {
            store.items = store.cache.load();
            store.needs_file = true;
            log::info!(
                "event=store_open source=cache needs_file=true items={}",
                store.items.len()
            );
            return store;
        };

        match file.read_raw() {
            Ok(raw) => {
                store.items = store.cache.load();
                store.attach(file, raw);
                log::info!(
                    "event=store_open source=file items={}",
                    store.items.len()
                );
            }
            Err(e) => {
                log::warn!(
                    "event=store_open status=file_error path={} error={}",
                    file.location().display(),
                    e
                );
                store.notice(
                    NoticeKind::FileReadFailed,
                    format!("{}; using local copy, attach the data file again", e),
                );
                store.items = store.cache.load();
                store.needs_file = true;
            }
        }
        store
    }

    fn files_supported(&self) -> bool {
        self.config.file.enabled && self.host.is_supported()
    }

    /// Take over `file`, whose contents were just read as `raw`.
    ///
    /// Parsable contents replace memory and are mirrored to the cache. A
    /// blank file is seeded with the current collection. Anything else is
    /// preserved in the recovery log and memory is kept.
    fn attach(&mut self, file: Arc<dyn ExternalFile>, raw: RawSnapshot) {
        self.last_modified = Some(raw.modified);
        self.file = Some(file);
        self.needs_file = false;

        if raw.text.trim().is_empty() && !self.items.is_empty() {
            self.write_file();
            return;
        }
        match raw.parse() {
            Ok(items) => {
                self.items = self.unique_file_items(items);
                self.write_cache();
            }
            Err(e) => self.record_unparseable(&raw, &e),
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        tree::find(&self.items, id)
    }

    /// Pretty JSON of the whole collection, the same form as the data file
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.items)
    }

    /// True when the host could attach a file but none is attached (or the
    /// attached one has stopped working)
    pub fn needs_file(&self) -> bool {
        self.needs_file
    }

    pub fn is_attached(&self) -> bool {
        self.file.is_some()
    }

    pub fn file_location(&self) -> Option<PathBuf> {
        self.file.as_ref().map(|f| f.location())
    }

    pub fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn cache_path(&self) -> PathBuf {
        self.cache.path()
    }

    /// Drain pending notices
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    pub fn add_item(&mut self, draft: ItemDraft) -> Result<Item, StoreError> {
        let item = item_ops::add_item(&mut self.items, draft)?;
        log::debug!("event=item_add id={} type={}", item.id, item.item_type());
        self.persist();
        Ok(item)
    }

    pub fn update_item(&mut self, id: &str, patch: ItemPatch) -> Result<Item, StoreError> {
        let item = item_ops::update_item(&mut self.items, id, patch)?;
        log::debug!("event=item_update id={}", item.id);
        self.persist();
        Ok(item)
    }

    /// Delete an item and its subtree. Returns what was removed; deleting a
    /// missing id is a no-op.
    pub fn delete_item(&mut self, id: &str) -> Vec<Item> {
        let removed = item_ops::delete_item(&mut self.items, id);
        if removed.is_empty() {
            return removed;
        }
        log::debug!("event=item_delete id={} removed={}", id, removed.len());
        recovery::log_deletion(&self.data_dir, &removed);
        self.persist();
        removed
    }

    /// Flip a folder open or closed. `None` for a missing id or non-folder.
    pub fn toggle_folder(&mut self, id: &str) -> Option<bool> {
        let state = item_ops::toggle_folder(&mut self.items, id)?;
        self.persist();
        Some(state)
    }

    /// Validate and append a batch of raw records. All or nothing.
    pub fn import_items(&mut self, raw: &[Value]) -> Result<Reconciled, StoreError> {
        let reconciled = import::reconcile(&self.items, raw)?;
        self.items.extend(reconciled.items.iter().cloned());
        log::info!(
            "event=import status=ok items={} remapped={}",
            reconciled.items.len(),
            reconciled.remapped.len()
        );
        self.persist();
        Ok(reconciled)
    }

    /// Import from pasted or file text
    pub fn import_json(&mut self, text: &str) -> Result<Reconciled, StoreError> {
        let raw = import::parse_import(text)?;
        self.import_items(&raw)
    }

    /// Attach a data file chosen through the host.
    ///
    /// No-op when one is already attached. Returns whether a file was
    /// attached; `false` also when the picker was dismissed. If the chosen
    /// file can't be read, nothing changes and the error is returned.
    pub fn pick_file(&mut self) -> Result<bool, StoreError> {
        if self.file.is_some() {
            return Ok(false);
        }
        if !self.files_supported() {
            log::info!("event=file_pick status=unsupported");
            return Ok(false);
        }
        let Some(file) = self.host.pick_file(&self.config.file.suggested_name)? else {
            log::info!("event=file_pick status=dismissed");
            return Ok(false);
        };
        let raw = file.read_raw()?;

        if let Err(e) = self.host.store_handle(file.as_ref()) {
            log::warn!(
                "event=handle_store status=error path={} error={}",
                file.location().display(),
                e
            );
        }
        log::info!(
            "event=file_pick status=ok path={}",
            file.location().display()
        );
        self.attach(file, raw);
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Polling
    // -----------------------------------------------------------------------

    /// Snapshot what a poll needs, so the read can happen without the store
    pub fn poll_target(&self) -> Option<PollTarget> {
        let file = self.file.clone()?;
        Some(PollTarget {
            file,
            since: self.last_modified,
        })
    }

    /// Check the data file once and merge any external change.
    pub fn poll_once(&mut self) -> PollOutcome {
        match self.poll_target() {
            Some(target) => {
                let fetched = target.fetch();
                self.apply_fetch(fetched)
            }
            None => PollOutcome::Detached,
        }
    }

    /// Fold the result of a `PollTarget::fetch` into memory.
    ///
    /// File items win for their id; items only in memory are kept. The
    /// merged list is mirrored to the cache, never written back to the file.
    pub fn apply_fetch(&mut self, fetched: Fetched) -> PollOutcome {
        if self.file.is_none() {
            return PollOutcome::Detached;
        }
        let raw = match fetched {
            Fetched::Unchanged => {
                self.poll_failing = false;
                return PollOutcome::Unchanged;
            }
            Fetched::Failed(e) => {
                log::warn!("event=file_poll status=error error={}", e);
                if matches!(e, FileError::Permission { .. }) {
                    self.needs_file = true;
                }
                if !self.poll_failing {
                    self.poll_failing = true;
                    self.notice(NoticeKind::FileReadFailed, e.to_string());
                }
                return PollOutcome::Failed {
                    error: e.to_string(),
                };
            }
            Fetched::Changed(raw) => raw,
        };
        self.poll_failing = false;

        // Our own write landed after the read was started
        if self.last_modified.is_some_and(|last| raw.modified <= last) {
            return PollOutcome::Unchanged;
        }
        self.last_modified = Some(raw.modified);

        let file_items = match raw.parse() {
            Ok(items) => self.unique_file_items(items),
            Err(e) => {
                self.record_unparseable(&raw, &e);
                return PollOutcome::Unparseable;
            }
        };

        let from_file = file_items.len();
        let merged = merge_items(&self.items, &file_items);
        let kept = merged.len().saturating_sub(from_file);
        self.items = merged;
        self.write_cache();
        log::info!(
            "event=file_merge status=ok from_file={} kept={}",
            from_file,
            kept
        );
        PollOutcome::Merged { from_file, kept }
    }

    // -----------------------------------------------------------------------
    // Write-through
    // -----------------------------------------------------------------------

    /// Memory has changed: write the cache, then the file.
    fn persist(&mut self) {
        self.write_cache();
        self.write_file();
    }

    fn write_cache(&mut self) {
        if let Err(e) = self.cache.save(&self.items) {
            log::warn!("event=cache_write status=error error={}", e);
            if self.file.is_none() {
                let body = serde_json::to_string_pretty(&self.items).unwrap_or_default();
                recovery::log_recovery(
                    &self.data_dir,
                    RecoveryEntry::new(RecoveryCategory::Cache, "local cache write failed")
                        .field("Cache", self.cache.path().display().to_string())
                        .field("Error", e.to_string())
                        .body(body),
                );
            }
            self.notice(NoticeKind::StorageUnavailable, e.to_string());
        }
    }

    fn write_file(&mut self) {
        let Some(file) = self.file.clone() else {
            return;
        };
        match file.write(&self.items) {
            Ok(stamp) => {
                self.last_modified = Some(stamp);
                self.needs_file = false;
            }
            Err(e) => {
                log::warn!(
                    "event=file_write status=error path={} error={}",
                    file.location().display(),
                    e
                );
                let body = serde_json::to_string_pretty(&self.items).unwrap_or_default();
                recovery::log_recovery(
                    &self.data_dir,
                    RecoveryEntry::new(RecoveryCategory::Write, "data file write failed")
                        .field("Target", file.location().display().to_string())
                        .field("Error", e.to_string())
                        .body(body),
                );
                let message = match &e {
                    FileError::Permission { .. } => {
                        self.needs_file = true;
                        format!("{}; changes are kept locally, attach the file again", e)
                    }
                    _ => format!("{}; changes are kept locally", e),
                };
                self.notice(NoticeKind::FileWriteFailed, message);
            }
        }
    }

    /// Drop repeated ids from file contents, keeping the first of each.
    /// Dropped copies go to the recovery log.
    fn unique_file_items(&mut self, items: Vec<Item>) -> Vec<Item> {
        let (unique, dropped) = dedupe_by_id(items);
        if dropped.is_empty() {
            return unique;
        }
        let location = self
            .file_location()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        log::warn!(
            "event=file_duplicates path={} dropped={}",
            location,
            dropped.len()
        );
        let body = serde_json::to_string_pretty(&dropped).unwrap_or_default();
        recovery::log_recovery(
            &self.data_dir,
            RecoveryEntry::new(RecoveryCategory::Parser, "data file repeats item ids")
                .field("Source", location.clone())
                .field("Dropped", dropped.len().to_string())
                .body(body),
        );
        self.notice(
            NoticeKind::FileDuplicateIds,
            format!(
                "{} repeats {} item id(s); kept the first of each, the rest are in the recovery log",
                location,
                dropped.len()
            ),
        );
        unique
    }

    /// Log a data file that doesn't parse, once per modification stamp.
    fn record_unparseable(&mut self, raw: &RawSnapshot, error: &serde_json::Error) {
        if self.last_parse_failure == Some(raw.modified) {
            return;
        }
        self.last_parse_failure = Some(raw.modified);
        let location = self
            .file_location()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        log::warn!(
            "event=file_parse status=error path={} error={}",
            location,
            error
        );
        recovery::log_recovery(
            &self.data_dir,
            RecoveryEntry::new(RecoveryCategory::Parser, "data file could not be parsed")
                .field("Source", location.clone())
                .field("Error", error.to_string())
                .body(raw.text.clone()),
        );
        self.notice(
            NoticeKind::FileUnparseable,
            format!(
                "{} is not a valid item list ({}); its text was saved to the recovery log",
                location, error
            ),
        );
    }

    fn notice(&mut self, kind: NoticeKind, message: impl Into<String>) {
        self.notices.push(Notice {
            kind,
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::file_backend::PathFile;
    use crate::io::host::PathHost;
    use crate::io::recovery::read_recovery_entries;
    use crate::model::item::ItemKind;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn open(tmp: &TempDir) -> Store {
        let host = PathHost::new(tmp.path(), true);
        Store::open(tmp.path(), &Config::default(), Box::new(host))
    }

    fn open_attached(tmp: &TempDir, content: &str) -> (Store, PathBuf) {
        let path = tmp.path().join("shortcuts-data.json");
        fs::write(&path, content).unwrap();
        let host = PathHost::new(tmp.path(), true).with_target(&path);
        let mut store = Store::open(tmp.path(), &Config::default(), Box::new(host));
        assert!(store.pick_file().unwrap());
        (store, path)
    }

    /// Rewrite the data file as another program would, with a later stamp
    fn external_edit(path: &Path, content: &str) {
        let before = fs::metadata(path).unwrap().modified().unwrap();
        fs::write(path, content).unwrap();
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(before + Duration::from_secs(5)).unwrap();
    }

    #[test]
    fn cache_only_session_needs_file() {
        let tmp = TempDir::new().unwrap();
        let mut store = open(&tmp);
        assert!(store.needs_file());
        assert!(!store.is_attached());

        let folder = store.add_item(ItemDraft::folder("Work")).unwrap();
        store
            .add_item(ItemDraft::link("Docs", "https://docs.rs").under(&folder.id))
            .unwrap();

        let reopened = open(&tmp);
        assert_eq!(reopened.items(), store.items());
    }

    #[test]
    fn unsupported_host_does_not_ask_for_a_file() {
        let tmp = TempDir::new().unwrap();
        let host = PathHost::new(tmp.path(), false);
        let mut store = Store::open(tmp.path(), &Config::default(), Box::new(host));
        assert!(!store.needs_file());
        assert!(!store.pick_file().unwrap());
    }

    #[test]
    fn folder_loop_leaves_state_unchanged() {
        let tmp = TempDir::new().unwrap();
        let mut store = open(&tmp);
        let f1 = store.add_item(ItemDraft::folder("F1")).unwrap();
        let f2 = store
            .add_item(ItemDraft::folder("F2").under(&f1.id))
            .unwrap();
        let before = store.items().to_vec();

        for target in [&f1.id, &f2.id] {
            let patch = ItemPatch {
                parent_id: Some(Some(target.clone())),
                ..Default::default()
            };
            let err = store.update_item(&f1.id, patch).unwrap_err();
            assert!(matches!(err, StoreError::Item(ItemError::FolderLoop { .. })));
        }
        assert_eq!(store.items(), before.as_slice());
    }

    #[test]
    fn delete_is_logged_for_recovery() {
        let tmp = TempDir::new().unwrap();
        let mut store = open(&tmp);
        let f = store.add_item(ItemDraft::folder("F")).unwrap();
        store
            .add_item(ItemDraft::snippet("S", "body").under(&f.id))
            .unwrap();

        assert_eq!(store.delete_item(&f.id).len(), 2);
        assert!(store.items().is_empty());
        assert!(store.delete_item(&f.id).is_empty());

        let entries = read_recovery_entries(tmp.path(), None, None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].category, RecoveryCategory::Delete);
    }

    #[test]
    fn toggle_persists_only_for_folders() {
        let tmp = TempDir::new().unwrap();
        let mut store = open(&tmp);
        let f = store.add_item(ItemDraft::folder("F")).unwrap();
        let l = store.add_item(ItemDraft::link("L", "https://l")).unwrap();
        assert_eq!(store.toggle_folder(&f.id), Some(false));
        assert_eq!(store.toggle_folder(&l.id), None);
        assert_eq!(store.toggle_folder("missing"), None);
        assert_eq!(open(&tmp).get(&f.id).unwrap().is_open(), Some(false));
    }

    #[test]
    fn import_json_rejects_non_array() {
        let tmp = TempDir::new().unwrap();
        let mut store = open(&tmp);
        let err = store.import_json("{\"type\": \"link\"}").unwrap_err();
        assert!(matches!(err, StoreError::Import(ImportError::NotAnArray)));
        assert!(store.items().is_empty());
    }

    #[test]
    fn attaching_non_empty_file_replaces_memory() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.json");
        fs::write(
            &path,
            r#"[{"id":"x","title":"From file","type":"link","url":"https://f","createdAt":3}]"#,
        )
        .unwrap();

        let host = PathHost::new(tmp.path(), true).with_target(&path);
        let mut store = Store::open(tmp.path(), &Config::default(), Box::new(host));
        store.add_item(ItemDraft::link("Local", "https://l")).unwrap();

        assert!(store.pick_file().unwrap());
        assert!(!store.needs_file());
        let titles: Vec<&str> = store.items().iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["From file"]);
        // Already attached: picking again is a no-op
        assert!(!store.pick_file().unwrap());
    }

    const REPEATED_IDS: &str = r#"[
        {"id":"d","title":"One","type":"folder"},
        {"id":"d","title":"Two","type":"folder"},
        {"id":"e","title":"Other","type":"link","url":"https://e"}
    ]"#;

    #[test]
    fn attaching_file_with_repeated_ids_keeps_ids_unique() {
        let tmp = TempDir::new().unwrap();
        let (mut store, path) = open_attached(&tmp, REPEATED_IDS);
        let titles: Vec<&str> = store.items().iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["One", "Other"]);

        let notices = store.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, NoticeKind::FileDuplicateIds);
        let entries = read_recovery_entries(tmp.path(), None, None);
        assert_eq!(entries[0].category, RecoveryCategory::Parser);
        assert!(entries[0].body.contains("Two"));

        let patch = ItemPatch {
            title: Some("Renamed".into()),
            ..Default::default()
        };
        store.update_item("d", patch).unwrap();
        let on_disk = PathFile::new(&path).read().unwrap();
        let with_d: Vec<&str> = on_disk
            .items
            .iter()
            .filter(|i| i.id == "d")
            .map(|i| i.title.as_str())
            .collect();
        assert_eq!(with_d, vec!["Renamed"]);
    }

    #[test]
    fn remembered_file_with_repeated_ids_is_deduped_on_open() {
        let tmp = TempDir::new().unwrap();
        let (store, path) = open_attached(&tmp, "[]");
        drop(store);
        fs::write(&path, REPEATED_IDS).unwrap();

        let reopened = open(&tmp);
        assert!(reopened.is_attached());
        assert_eq!(reopened.items().len(), 2);
        assert_eq!(reopened.get("d").unwrap().title, "One");
    }

    #[test]
    fn polled_file_with_repeated_ids_counts_unique_items() {
        let tmp = TempDir::new().unwrap();
        let (mut store, path) = open_attached(&tmp, "[]");
        external_edit(&path, REPEATED_IDS);
        assert_eq!(
            store.poll_once(),
            PollOutcome::Merged {
                from_file: 2,
                kept: 0
            }
        );
        assert_eq!(store.get("d").unwrap().title, "One");
    }

    #[test]
    fn attaching_blank_file_seeds_it() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("new.json");
        let host = PathHost::new(tmp.path(), true).with_target(&path);
        let mut store = Store::open(tmp.path(), &Config::default(), Box::new(host));
        store.add_item(ItemDraft::snippet("Keep me", "text")).unwrap();

        assert!(store.pick_file().unwrap());
        assert_eq!(store.items().len(), 1);
        let on_disk = PathFile::new(&path).read().unwrap();
        assert_eq!(on_disk.items, store.items());
    }

    #[test]
    fn dismissed_picker_changes_nothing() {
        let tmp = TempDir::new().unwrap();
        let mut store = open(&tmp);
        assert!(!store.pick_file().unwrap());
        assert!(store.needs_file());
        assert!(!store.is_attached());
    }

    #[test]
    fn attached_mutations_write_file_and_do_not_self_merge() {
        let tmp = TempDir::new().unwrap();
        let (mut store, path) = open_attached(&tmp, "[]");
        let item = store.add_item(ItemDraft::link("A", "https://a")).unwrap();

        let on_disk = PathFile::new(&path).read().unwrap();
        assert_eq!(on_disk.items, vec![item]);
        assert_eq!(store.poll_once(), PollOutcome::Unchanged);
    }

    #[test]
    fn poll_merges_external_edit_keeping_memory_only_items() {
        let tmp = TempDir::new().unwrap();
        let (mut store, path) = open_attached(&tmp, "[]");
        let mine = store.add_item(ItemDraft::link("Mine", "https://m")).unwrap();

        external_edit(
            &path,
            r#"[{"id":"ext","title":"External","type":"snippet","content":"c","createdAt":9}]"#,
        );
        assert_eq!(
            store.poll_once(),
            PollOutcome::Merged {
                from_file: 1,
                kept: 1
            }
        );
        let ids: Vec<&str> = store.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["ext", mine.id.as_str()]);

        // Merged list reaches the cache but the file is left as edited
        let cached = LocalCache::new(tmp.path(), "shortcuts-items", 1 << 20).load();
        assert_eq!(cached.len(), 2);
        assert_eq!(PathFile::new(&path).read().unwrap().items.len(), 1);
        assert_eq!(store.poll_once(), PollOutcome::Unchanged);
    }

    #[test]
    fn file_wins_for_shared_ids() {
        let tmp = TempDir::new().unwrap();
        let (mut store, path) = open_attached(&tmp, "[]");
        let item = store.add_item(ItemDraft::link("Old", "https://a")).unwrap();

        let mut edited = item.clone();
        edited.title = "New".into();
        external_edit(&path, &serde_json::to_string(&vec![edited]).unwrap());
        store.poll_once();
        assert_eq!(store.get(&item.id).unwrap().title, "New");
    }

    #[test]
    fn unparseable_edit_is_recorded_once() {
        let tmp = TempDir::new().unwrap();
        let (mut store, path) = open_attached(&tmp, "[]");
        store.add_item(ItemDraft::folder("F")).unwrap();
        store.take_notices();

        external_edit(&path, "[{\"oops\"");
        assert_eq!(store.poll_once(), PollOutcome::Unparseable);
        assert_eq!(store.poll_once(), PollOutcome::Unchanged);
        assert_eq!(store.items().len(), 1);

        let entries = read_recovery_entries(tmp.path(), None, None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].category, RecoveryCategory::Parser);
        assert_eq!(entries[0].body, "[{\"oops\"");

        let notices = store.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, NoticeKind::FileUnparseable);
    }

    #[cfg(unix)]
    #[test]
    fn write_failure_keeps_memory_and_cache() {
        let tmp = TempDir::new().unwrap();
        let (mut store, path) = open_attached(&tmp, "[]");
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_readonly(true);
        fs::set_permissions(&path, perms).unwrap();

        let item = store.add_item(ItemDraft::link("A", "https://a")).unwrap();
        assert_eq!(store.items(), &[item.clone()]);
        assert!(store.needs_file());

        let notices = store.take_notices();
        assert_eq!(notices[0].kind, NoticeKind::FileWriteFailed);
        let cached = LocalCache::new(tmp.path(), "shortcuts-items", 1 << 20).load();
        assert_eq!(cached, vec![item]);

        let entries = read_recovery_entries(tmp.path(), None, None);
        assert_eq!(entries[0].category, RecoveryCategory::Write);
    }

    #[test]
    fn read_failure_during_poll_is_noticed_once() {
        let tmp = TempDir::new().unwrap();
        let (mut store, path) = open_attached(&tmp, "[]");
        fs::remove_file(&path).unwrap();

        assert!(matches!(store.poll_once(), PollOutcome::Failed { .. }));
        assert!(matches!(store.poll_once(), PollOutcome::Failed { .. }));
        let notices = store.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, NoticeKind::FileReadFailed);
    }

    #[test]
    fn remembered_file_is_adopted_on_open() {
        let tmp = TempDir::new().unwrap();
        let (mut store, _path) = open_attached(&tmp, "[]");
        store.add_item(ItemDraft::folder("Shared")).unwrap();
        let expected = store.items().to_vec();
        drop(store);

        let reopened = open(&tmp);
        assert!(reopened.is_attached());
        assert!(!reopened.needs_file());
        assert_eq!(reopened.items(), expected.as_slice());
    }

    #[test]
    fn missing_remembered_file_falls_back_to_cache() {
        let tmp = TempDir::new().unwrap();
        let (mut store, path) = open_attached(&tmp, "[]");
        store.add_item(ItemDraft::folder("Cached")).unwrap();
        drop(store);
        fs::remove_file(&path).unwrap();

        let mut reopened = open(&tmp);
        assert!(!reopened.is_attached());
        assert!(reopened.needs_file());
        assert_eq!(reopened.items().len(), 1);
        let notices = reopened.take_notices();
        assert_eq!(notices[0].kind, NoticeKind::FileReadFailed);
    }

    #[test]
    fn export_matches_file_format() {
        let tmp = TempDir::new().unwrap();
        let mut store = open(&tmp);
        store.add_item(ItemDraft::snippet("S", "x")).unwrap();
        let exported = store.export_json().unwrap();
        let parsed: Vec<Item> = serde_json::from_str(&exported).unwrap();
        assert_eq!(parsed, store.items());
        assert!(matches!(parsed[0].kind, ItemKind::Snippet { .. }));
    }
}
