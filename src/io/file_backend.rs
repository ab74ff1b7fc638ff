//! The user-selected data file.
//!
//! The file holds the full item list as pretty-printed JSON and may be edited
//! by other programs at any time. It is only ever rewritten whole.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tempfile::NamedTempFile;

use crate::model::item::Item;

/// Access a permission check was made for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    ReadWrite,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessMode::Read => write!(f, "read"),
            AccessMode::ReadWrite => write!(f, "readwrite"),
        }
    }
}

/// Error type for data file access
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("permission denied ({mode}) for {path}")]
    Permission { path: PathBuf, mode: AccessMode },
    #[error("could not read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("could not write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// File contents as read, before parsing
#[derive(Debug, Clone)]
pub struct RawSnapshot {
    pub text: String,
    pub modified: SystemTime,
}

impl RawSnapshot {
    /// Parse the text as an item list. An empty file is an empty list.
    pub fn parse(&self) -> Result<Vec<Item>, serde_json::Error> {
        if self.text.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&self.text)
    }
}

/// Parsed file contents with the modification stamp they were read at
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    pub items: Vec<Item>,
    pub modified: SystemTime,
}

/// An externally editable data file.
///
/// Every call re-verifies access, since permission can be revoked between
/// calls.
pub trait ExternalFile: Send + Sync {
    /// Persistable description of where the file lives
    fn location(&self) -> PathBuf;

    /// Current modification stamp, without reading contents
    fn modified(&self) -> Result<SystemTime, FileError>;

    /// Read the whole file
    fn read_raw(&self) -> Result<RawSnapshot, FileError>;

    /// Replace the whole file with `items`. Returns the new stamp.
    fn write(&self, items: &[Item]) -> Result<SystemTime, FileError>;

    fn read(&self) -> Result<FileSnapshot, FileError> {
        let raw = self.read_raw()?;
        let items = raw.parse().map_err(|source| FileError::Parse {
            path: self.location(),
            source,
        })?;
        Ok(FileSnapshot {
            items,
            modified: raw.modified,
        })
    }
}

/// Data file at a filesystem path
#[derive(Debug, Clone)]
pub struct PathFile {
    path: PathBuf,
}

impl PathFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        PathFile { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check `mode` access is still granted.
    pub fn verify_permission(&self, mode: AccessMode) -> Result<(), FileError> {
        match File::open(&self.path) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                return Err(self.denied(mode));
            }
            Err(source) => {
                return Err(FileError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        }
        if mode == AccessMode::ReadWrite {
            let meta = fs::metadata(&self.path).map_err(|source| FileError::Read {
                path: self.path.clone(),
                source,
            })?;
            if meta.permissions().readonly() {
                return Err(self.denied(mode));
            }
        }
        Ok(())
    }

    fn denied(&self, mode: AccessMode) -> FileError {
        FileError::Permission {
            path: self.path.clone(),
            mode,
        }
    }

    fn write_error(&self, source: io::Error) -> FileError {
        if source.kind() == io::ErrorKind::PermissionDenied {
            return self.denied(AccessMode::ReadWrite);
        }
        FileError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl ExternalFile for PathFile {
    fn location(&self) -> PathBuf {
        self.path.clone()
    }

    fn modified(&self) -> Result<SystemTime, FileError> {
        self.verify_permission(AccessMode::Read)?;
        fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .map_err(|source| FileError::Read {
                path: self.path.clone(),
                source,
            })
    }

    fn read_raw(&self) -> Result<RawSnapshot, FileError> {
        self.verify_permission(AccessMode::Read)?;
        let read_err = |source| FileError::Read {
            path: self.path.clone(),
            source,
        };
        let text = fs::read_to_string(&self.path).map_err(read_err)?;
        let modified = fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .map_err(read_err)?;
        Ok(RawSnapshot { text, modified })
    }

    fn write(&self, items: &[Item]) -> Result<SystemTime, FileError> {
        self.verify_permission(AccessMode::ReadWrite)?;
        let json = serde_json::to_string_pretty(items).map_err(|e| FileError::Write {
            path: self.path.clone(),
            source: io::Error::other(e),
        })?;

        let dir = self.path.parent().unwrap_or(Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| self.write_error(e))?;
        tmp.write_all(json.as_bytes())
            .and_then(|_| tmp.flush())
            .map_err(|e| self.write_error(e))?;
        // Keep the mode the user gave the file
        if let Ok(meta) = fs::metadata(&self.path) {
            let _ = fs::set_permissions(tmp.path(), meta.permissions());
        }
        tmp.persist(&self.path)
            .map_err(|e| self.write_error(e.error))?;

        fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .map_err(|source| FileError::Read {
                path: self.path.clone(),
                source,
            })
    }
}
