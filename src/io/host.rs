use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::io::file_backend::{ExternalFile, FileError, PathFile};
use crate::io::handle_store::{DATA_FILE_HANDLE, HandleStore};

/// What the environment offers for working with a data file: a picker, and
/// somewhere to remember the grant between sessions.
pub trait FileHost: Send {
    /// Whether external files can be used at all
    fn is_supported(&self) -> bool;

    /// The file remembered from a previous session, if any
    fn stored_handle(&self) -> Option<Arc<dyn ExternalFile>>;

    /// Remember `file` for future sessions
    fn store_handle(&self, file: &dyn ExternalFile) -> io::Result<()>;

    /// Ask the user for a file to save to. `Ok(None)` when dismissed.
    fn pick_file(&mut self, suggested_name: &str) -> Result<Option<Arc<dyn ExternalFile>>, FileError>;
}

/// Host for the command line: the "picker" answers with a path given up
/// front, and grants are remembered in the handle store.
pub struct PathHost {
    handles: HandleStore,
    supported: bool,
    target: Option<PathBuf>,
}

impl PathHost {
    pub fn new(data_dir: &Path, supported: bool) -> Self {
        PathHost {
            handles: HandleStore::new(data_dir),
            supported,
            target: None,
        }
    }

    /// Set what the next `pick_file` answers with
    pub fn with_target(mut self, target: impl Into<PathBuf>) -> Self {
        self.target = Some(target.into());
        self
    }
}

impl FileHost for PathHost {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn stored_handle(&self) -> Option<Arc<dyn ExternalFile>> {
        let entry = self.handles.get(DATA_FILE_HANDLE)?;
        Some(Arc::new(PathFile::new(entry.path)))
    }

    fn store_handle(&self, file: &dyn ExternalFile) -> io::Result<()> {
        self.handles.put(DATA_FILE_HANDLE, &file.location())
    }

    fn pick_file(&mut self, suggested_name: &str) -> Result<Option<Arc<dyn ExternalFile>>, FileError> {
        let Some(target) = self.target.take() else {
            return Ok(None);
        };
        let path = if target.is_dir() {
            target.join(suggested_name)
        } else {
            target
        };

        // A save picker hands back the file, creating it if needed
        if !path.exists() {
            OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .map_err(|source| FileError::Write {
                    path: path.clone(),
                    source,
                })?;
            log::info!("event=file_create status=ok path={}", path.display());
        } else if fs::metadata(&path).map(|m| m.is_dir()).unwrap_or(false) {
            return Err(FileError::Read {
                path,
                source: io::Error::other("is a directory"),
            });
        }

        // Writes rename over the path, so it must name the file, not a link
        let resolved = fs::canonicalize(&path).map_err(|source| FileError::Read {
            path: path.clone(),
            source,
        })?;
        Ok(Some(Arc::new(PathFile::new(resolved))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn no_target_means_dismissed() {
        let tmp = TempDir::new().unwrap();
        let mut host = PathHost::new(tmp.path(), true);
        assert!(host.pick_file("shortcuts-data.json").unwrap().is_none());
    }

    #[test]
    fn directory_target_uses_suggested_name_and_creates_file() {
        let tmp = TempDir::new().unwrap();
        let mut host = PathHost::new(tmp.path(), true).with_target(tmp.path());
        let file = host.pick_file("shortcuts-data.json").unwrap().unwrap();
        let expected = tmp.path().join("shortcuts-data.json");
        assert!(expected.exists());
        assert_eq!(file.location(), fs::canonicalize(&expected).unwrap());
        // Target is used once
        assert!(host.pick_file("shortcuts-data.json").unwrap().is_none());
    }

    #[test]
    fn existing_file_is_left_alone() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("mine.json");
        fs::write(&path, "[]").unwrap();
        let mut host = PathHost::new(tmp.path(), true).with_target(&path);
        host.pick_file("ignored.json").unwrap().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_target_resolves_to_the_real_file() {
        let tmp = TempDir::new().unwrap();
        let real = tmp.path().join("real.json");
        let link = tmp.path().join("link.json");
        fs::write(&real, "[]").unwrap();
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let mut host = PathHost::new(tmp.path(), true).with_target(&link);
        let file = host.pick_file("ignored.json").unwrap().unwrap();
        assert_eq!(file.location(), fs::canonicalize(&real).unwrap());
    }

    #[test]
    fn stored_handle_round_trip() {
        let tmp = TempDir::new().unwrap();
        let host = PathHost::new(tmp.path(), true);
        assert!(host.stored_handle().is_none());

        let file = PathFile::new(tmp.path().join("data.json"));
        host.store_handle(&file).unwrap();
        let restored = host.stored_handle().unwrap();
        assert_eq!(restored.location(), tmp.path().join("data.json"));
    }
}
