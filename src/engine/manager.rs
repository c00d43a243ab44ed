//! Cross-worker control: suspend latch, cancel flag, join handles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::thread::JoinHandle;

use crate::error::SyncError;

/// Manually-reset latch. Initially set; workers pass through while set and
/// block while cleared.
#[derive(Debug)]
struct Latch {
    set: Mutex<bool>,
    cond: Condvar,
}

impl Latch {
    fn new() -> Self {
        Latch {
            set: Mutex::new(true),
            cond: Condvar::new(),
        }
    }

    fn clear(&self) {
        *self.set.lock().unwrap() = false;
    }

    fn set(&self) {
        *self.set.lock().unwrap() = true;
        self.cond.notify_all();
    }

    fn is_set(&self) -> bool {
        *self.set.lock().unwrap()
    }

    fn wait_set(&self) {
        let mut set = self.set.lock().unwrap();
        while !*set {
            set = self.cond.wait(set).unwrap();
        }
    }
}

/// Control state shared between the driver and its workers.
///
/// Suspend is a resettable latch observed at the top of every block
/// iteration; cancel is monotonic for the lifetime of one run. Worker
/// handles are registered at spawn and drained by [`SyncManager::wait`].
#[derive(Debug)]
pub struct SyncManager {
    suspend: Latch,
    cancel: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for SyncManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncManager {
    pub fn new() -> Self {
        SyncManager {
            suspend: Latch::new(),
            cancel: AtomicBool::new(false),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Clear the latch; every worker blocks at its next suspension point.
    pub fn suspend(&self) {
        self.suspend.clear();
    }

    /// Set the latch; suspended workers continue.
    pub fn resume(&self) {
        self.suspend.set();
    }

    /// Latch cancellation. Idempotent; workers exit at their next check, but
    /// only after finishing the in-flight block so helper streams stay framed.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
        // A suspended worker must still be able to observe the cancel.
        self.suspend.set();
    }

    pub fn suspended(&self) -> bool {
        !self.suspend.is_set()
    }

    pub fn canceled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// True once no registered worker is still running. Trivially true
    /// before any worker was spawned.
    pub fn finished(&self) -> bool {
        self.workers
            .lock()
            .unwrap()
            .iter()
            .all(|handle| handle.is_finished())
    }

    /// Block until every worker has exited.
    pub fn wait(&self) {
        let handles: Vec<_> = self.workers.lock().unwrap().drain(..).collect();
        for handle in handles {
            if handle.join().is_err() {
                log::error!("sync worker panicked");
            }
        }
    }

    pub(crate) fn register(&self, handle: JoinHandle<()>) {
        self.workers.lock().unwrap().push(handle);
    }

    /// Suspension point: block while suspended, then report cancellation as
    /// [`SyncError::Canceled`] so the worker loop unwinds. Called by every
    /// worker at the top of each block iteration.
    pub fn checkpoint(&self, worker_id: usize) -> Result<(), SyncError> {
        if self.suspended() {
            log::info!("[worker {worker_id}] waiting for resume");
            self.suspend.wait_set();
        }
        if self.canceled() {
            log::info!("[worker {worker_id}] sync canceled");
            return Err(SyncError::Canceled);
        }
        Ok(())
    }
}
