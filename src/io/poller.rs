use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::io::lock::{DataLock, LockMode};
use crate::store::{PollOutcome, Store, StoreError};

fn lock(store: &Mutex<Store>) -> MutexGuard<'_, Store> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One poll from the background thread: find out what to read under the
/// lock, read without it, then merge under it again.
///
/// With `data_dir` set the whole tick holds the directory lock exclusively.
/// `None` means the directory was busy and the tick was skipped; the stamp
/// is left alone so the next tick reads the change.
fn poll_tick(
    store: &Mutex<Store>,
    data_dir: Option<&PathBuf>,
    patience: Duration,
) -> Option<PollOutcome> {
    let _guard = match data_dir {
        Some(dir) => match DataLock::acquire(dir, LockMode::Exclusive, patience) {
            Ok(guard) => Some(guard),
            Err(e) => {
                log::debug!("event=file_poll status=skipped error={}", e);
                return None;
            }
        },
        None => None,
    };
    let Some(target) = lock(store).poll_target() else {
        return Some(PollOutcome::Detached);
    };
    let fetched = target.fetch();
    Some(lock(store).apply_fetch(fetched))
}

/// Background thread checking the data file at a fixed interval.
///
/// Each outcome is sent on `events`. Dropping the poller stops the thread
/// and waits for it; a read already in progress is allowed to finish.
pub struct Poller {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    /// Start polling every `interval`. With `data_dir`, each tick takes the
    /// data directory lock and is skipped if it stays busy for an interval.
    pub fn spawn(
        store: Arc<Mutex<Store>>,
        interval: Duration,
        data_dir: Option<PathBuf>,
        events: Sender<PollOutcome>,
    ) -> Poller {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = std::thread::spawn(move || {
            log::debug!("event=poller_start interval_ms={}", interval.as_millis());
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if let Some(outcome) = poll_tick(&store, data_dir.as_ref(), interval) {
                            // Nobody listening is fine
                            let _ = events.send(outcome);
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            log::debug!("event=poller_stop");
        });
        Poller {
            stop: Some(stop_tx),
            handle: Some(handle),
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// A store shared with its poll thread.
///
/// Polling runs while a data file is attached. Ending the session (drop)
/// stops polling.
pub struct Session {
    store: Arc<Mutex<Store>>,
    poller: Option<Poller>,
    locked: bool,
    events_tx: Sender<PollOutcome>,
    events_rx: Receiver<PollOutcome>,
}

impl Session {
    /// Share `store` with a poll thread in this process only.
    pub fn start(store: Store) -> Session {
        Self::with_locking(store, false)
    }

    /// Like `start`, but every poll holds the data directory lock so merges
    /// never interleave with another process changing the collection.
    pub fn start_locked(store: Store) -> Session {
        Self::with_locking(store, true)
    }

    fn with_locking(store: Store, locked: bool) -> Session {
        let (events_tx, events_rx) = mpsc::channel();
        let mut session = Session {
            store: Arc::new(Mutex::new(store)),
            poller: None,
            locked,
            events_tx,
            events_rx,
        };
        session.ensure_polling();
        session
    }

    fn ensure_polling(&mut self) {
        if self.poller.is_some() {
            return;
        }
        let (interval, data_dir) = {
            let store = lock(&self.store);
            if !store.is_attached() {
                return;
            }
            (
                Duration::from_millis(store.config().file.poll_interval_ms.max(1)),
                store.data_dir().to_path_buf(),
            )
        };
        self.poller = Some(Poller::spawn(
            Arc::clone(&self.store),
            interval,
            self.locked.then_some(data_dir),
            self.events_tx.clone(),
        ));
    }

    /// Exclusive access to the store
    pub fn lock(&self) -> MutexGuard<'_, Store> {
        lock(&self.store)
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_some()
    }

    /// Attach a data file and start polling it
    pub fn pick_file(&mut self) -> Result<bool, StoreError> {
        let attached = self.lock().pick_file()?;
        if attached {
            self.ensure_polling();
        }
        Ok(attached)
    }

    /// Wait up to `timeout` for the next poll outcome
    pub fn next_event(&self, timeout: Duration) -> Option<PollOutcome> {
        self.events_rx.recv_timeout(timeout).ok()
    }

    /// Non-blocking: every outcome queued so far
    pub fn drain_events(&self) -> Vec<PollOutcome> {
        let mut events = Vec::new();
        while let Ok(evt) = self.events_rx.try_recv() {
            events.push(evt);
        }
        events
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Join before the store goes away
        self.poller.take();
    }
}
