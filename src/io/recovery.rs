//! Append-only log of data the organizer could not store normally.
//!
//! One JSON object per line in `<data>/recovery.jsonl`. Entries carry the
//! payload that would otherwise be lost (the collection a failed file write
//! was carrying, the text of a data file that didn't parse, a deleted
//! subtree) so it can be restored by hand.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::io::lock::{self, LockMode};
use crate::model::item::Item;

/// Maximum size of the log before old entries are trimmed inline (1 MB).
const MAX_LOG_SIZE: u64 = 1_048_576;

/// Default number of days before entries are prunable.
pub const PRUNE_AGE_DAYS: i64 = 30;

/// Category of a recovery entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryCategory {
    /// A data file or cache that could not be parsed
    Parser,
    /// A write to the external data file failed
    Write,
    /// A write to the local cache failed
    Cache,
    /// Items removed by a delete
    Delete,
}

impl fmt::Display for RecoveryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryCategory::Parser => write!(f, "parser"),
            RecoveryCategory::Write => write!(f, "write"),
            RecoveryCategory::Cache => write!(f, "cache"),
            RecoveryCategory::Delete => write!(f, "delete"),
        }
    }
}

/// A single entry in the recovery log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryEntry {
    pub timestamp: DateTime<Utc>,
    pub category: RecoveryCategory,
    pub description: String,
    #[serde(default)]
    pub fields: IndexMap<String, String>,
    #[serde(default)]
    pub body: String,
}

impl RecoveryEntry {
    pub fn new(category: RecoveryCategory, description: impl Into<String>) -> Self {
        RecoveryEntry {
            timestamp: Utc::now(),
            category,
            description: description.into(),
            fields: IndexMap::new(),
            body: String::new(),
        }
    }

    pub fn field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Human-readable rendering for `sc recovery`
    pub fn to_display(&self) -> String {
        let mut out = format!(
            "{}  {}: {}\n",
            self.timestamp
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            self.category,
            self.description
        );
        for (key, value) in &self.fields {
            out.push_str(&format!("  {}: {}\n", key, value));
        }
        if !self.body.is_empty() {
            for line in self.body.lines() {
                out.push_str("    ");
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }
}

/// Summary info about the recovery log.
#[derive(Debug, Clone)]
pub struct RecoverySummary {
    pub entry_count: usize,
    pub oldest: Option<DateTime<Utc>>,
}

/// Return the path to the recovery log file.
pub fn recovery_log_path(data_dir: &Path) -> PathBuf {
    data_dir.join("recovery.jsonl")
}

/// Write `content` to `path` atomically using a temp file + rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Append an entry. Failures are logged and otherwise swallowed: the
/// recovery log must never turn a degraded write into a failed operation.
pub fn log_recovery(data_dir: &Path, entry: RecoveryEntry) {
    if let Err(e) = append_entry(data_dir, &entry) {
        log::warn!(
            "event=recovery_write status=error category={} error={}",
            entry.category,
            e
        );
    }
}

fn append_entry(data_dir: &Path, entry: &RecoveryEntry) -> io::Result<()> {
    let path = recovery_log_path(data_dir);

    if let Ok(meta) = fs::metadata(&path)
        && meta.len() > MAX_LOG_SIZE
    {
        trim_oversized(&path);
    }

    let mut line = serde_json::to_string(entry).map_err(io::Error::other)?;
    line.push('\n');
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    file.write_all(line.as_bytes())
}

/// Drop entries older than the prune age when the log has grown too big.
/// Skipped if another process holds the file.
fn trim_oversized(path: &Path) {
    let Ok(file) = OpenOptions::new().read(true).write(true).open(path) else {
        return;
    };
    if lock::try_flock(&file, LockMode::Exclusive).is_err() {
        return;
    }
    let Ok(content) = fs::read_to_string(path) else {
        return;
    };
    let cutoff = Utc::now() - chrono::Duration::days(PRUNE_AGE_DAYS);
    let kept = retain_since(&content, &cutoff);
    if kept.len() < content.len() {
        let _ = atomic_write(path, kept.as_bytes());
    }
}

/// Record items removed by a delete, so a mistaken delete can be undone by
/// re-importing the body.
pub fn log_deletion(data_dir: &Path, removed: &[Item]) {
    let Some(target) = removed.first() else {
        return;
    };
    let body = serde_json::to_string_pretty(removed).unwrap_or_default();
    log_recovery(
        data_dir,
        RecoveryEntry::new(
            RecoveryCategory::Delete,
            format!("{} \"{}\" deleted", target.item_type(), target.title),
        )
        .field("Item", target.id.clone())
        .field("Removed", removed.len().to_string())
        .body(body),
    );
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Read entries, most recent first. `limit` keeps only the newest `n`;
/// `since` drops anything older. Unparseable lines are skipped.
pub fn read_recovery_entries(
    data_dir: &Path,
    limit: Option<usize>,
    since: Option<DateTime<Utc>>,
) -> Vec<RecoveryEntry> {
    let content = match fs::read_to_string(recovery_log_path(data_dir)) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };

    let mut entries = parse_entries(&content);
    if let Some(since_dt) = since {
        entries.retain(|e| e.timestamp >= since_dt);
    }
    if let Some(n) = limit {
        let skip = entries.len().saturating_sub(n);
        entries.drain(..skip);
    }
    entries.reverse();
    entries
}

/// Get a summary of the recovery log.
pub fn recovery_summary(data_dir: &Path) -> Option<RecoverySummary> {
    let content = fs::read_to_string(recovery_log_path(data_dir)).ok()?;
    let entries = parse_entries(&content);
    if entries.is_empty() {
        return None;
    }
    Some(RecoverySummary {
        entry_count: entries.len(),
        oldest: entries.iter().map(|e| e.timestamp).min(),
    })
}

fn parse_entries(content: &str) -> Vec<RecoveryEntry> {
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| serde_json::from_str(l).ok())
        .collect()
}

// ---------------------------------------------------------------------------
// Pruning
// ---------------------------------------------------------------------------

/// Prune entries older than `before` (default: the prune age), or every
/// entry with `all`. Returns the number of entries removed.
pub fn prune_recovery(
    data_dir: &Path,
    before: Option<DateTime<Utc>>,
    all: bool,
) -> io::Result<usize> {
    let path = recovery_log_path(data_dir);
    if !path.exists() {
        return Ok(0);
    }

    let file = OpenOptions::new().read(true).write(true).open(&path)?;
    let mut locked = false;
    for _ in 0..10 {
        if lock::try_flock(&file, LockMode::Exclusive).is_ok() {
            locked = true;
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(100));
    }
    if !locked {
        return Err(io::Error::new(
            io::ErrorKind::WouldBlock,
            "recovery log is in use, try again later",
        ));
    }

    let content = fs::read_to_string(&path)?;
    let original_count = parse_entries(&content).len();
    let kept = if all {
        String::new()
    } else {
        let cutoff =
            before.unwrap_or_else(|| Utc::now() - chrono::Duration::days(PRUNE_AGE_DAYS));
        retain_since(&content, &cutoff)
    };
    let new_count = parse_entries(&kept).len();

    atomic_write(&path, kept.as_bytes())?;
    Ok(original_count - new_count)
}

/// Keep lines whose entry is at or after `cutoff`. Lines that don't parse
/// are kept; they may still be useful to a human.
fn retain_since(content: &str, cutoff: &DateTime<Utc>) -> String {
    let mut out = String::new();
    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        let keep = match serde_json::from_str::<RecoveryEntry>(line) {
            Ok(entry) => entry.timestamp >= *cutoff,
            Err(_) => true,
        };
        if keep {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
