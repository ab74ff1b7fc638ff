//! Cross-process locking of the data directory.
//!
//! Commands that change the collection hold the lock exclusively across
//! open, mutate and persist. Commands that only read hold it shared, since
//! opening a store may still mirror the data file into the cache or seed a
//! blank file. A watching session takes it exclusively around each poll.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// How long CLI commands wait for the data directory
pub const DEFAULT_PATIENCE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Shared => write!(f, "shared"),
            LockMode::Exclusive => write!(f, "exclusive"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not open lock file {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("{dir} is busy: another sc process is using the collection")]
    Busy { dir: PathBuf, mode: LockMode },
}

/// A held lock on `<data>/.lock`, released on drop.
///
/// The lock file is never removed, so every process locks the same inode.
pub struct DataLock {
    _file: File,
    mode: LockMode,
}

impl DataLock {
    /// Take the lock in `mode`, retrying with backoff for up to `patience`.
    pub fn acquire(data_dir: &Path, mode: LockMode, patience: Duration) -> Result<Self, LockError> {
        let path = lock_path(data_dir);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| LockError::Open {
                path: path.clone(),
                source,
            })?;

        let deadline = Instant::now() + patience;
        let mut backoff = Duration::from_millis(2);
        while try_flock(&file, mode).is_err() {
            let now = Instant::now();
            if now >= deadline {
                log::debug!("event=data_lock status=busy mode={}", mode);
                return Err(LockError::Busy {
                    dir: data_dir.to_path_buf(),
                    mode,
                });
            }
            std::thread::sleep(backoff.min(deadline - now));
            backoff = (backoff * 2).min(Duration::from_millis(100));
        }
        Ok(DataLock { _file: file, mode })
    }

    pub fn shared(data_dir: &Path) -> Result<Self, LockError> {
        Self::acquire(data_dir, LockMode::Shared, DEFAULT_PATIENCE)
    }

    pub fn exclusive(data_dir: &Path) -> Result<Self, LockError> {
        Self::acquire(data_dir, LockMode::Exclusive, DEFAULT_PATIENCE)
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

fn lock_path(data_dir: &Path) -> PathBuf {
    data_dir.join(".lock")
}

/// Non-blocking `flock` on an open file. Also used on the recovery log.
#[cfg(unix)]
pub(crate) fn try_flock(file: &File, mode: LockMode) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;
    let op = match mode {
        LockMode::Shared => libc::LOCK_SH,
        LockMode::Exclusive => libc::LOCK_EX,
    };
    // SAFETY: the fd belongs to `file`, which outlives the call
    if unsafe { libc::flock(file.as_raw_fd(), op | libc::LOCK_NB) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
pub(crate) fn try_flock(_file: &File, _mode: LockMode) -> io::Result<()> {
    Ok(())
}
