//! Engine module: sync drivers, workers, and their shared lifecycle pieces.

pub mod arg_parser;
pub mod cli;
pub mod hashing;
pub mod hooks;
pub mod local;
pub mod manager;
pub mod partition;
pub mod pull;
pub mod push;
pub mod status;

pub use arg_parser::Cli;
pub use hashing::HashAlgo;
pub use hooks::Hooks;
pub use local::local_to_local;
pub use manager::SyncManager;
pub use partition::WorkRange;
pub use pull::remote_to_local;
pub use push::local_to_remote;
pub use status::{BlockKind, Blocks, Status};

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::SyncError;

/// Handle on a running (or finished) sync: control signals plus the live
/// status. Returned by every driver.
#[derive(Debug)]
pub struct SyncHandle {
    manager: Arc<SyncManager>,
    status: Arc<Status>,
}

impl SyncHandle {
    pub(crate) fn new(manager: Arc<SyncManager>, status: Arc<Status>) -> Self {
        SyncHandle { manager, status }
    }

    /// Workers block at their next suspension point until [`SyncHandle::resume`].
    pub fn suspend(&self) {
        self.manager.suspend();
    }

    pub fn resume(&self) {
        self.manager.resume();
    }

    /// Latch cancellation; workers exit cooperatively.
    pub fn cancel(&self) {
        self.manager.cancel();
    }

    /// Block until every worker has exited.
    pub fn wait(&self) {
        self.manager.wait();
    }

    pub fn finished(&self) -> bool {
        self.manager.finished()
    }

    pub fn status(&self) -> &Arc<Status> {
        &self.status
    }

    pub fn manager(&self) -> &Arc<SyncManager> {
        &self.manager
    }
}

/// Spawn one named worker thread per id in `1..=workers` and register the
/// handles with the manager.
pub(crate) fn spawn_workers<F, W>(
    manager: &Arc<SyncManager>,
    workers: usize,
    make_worker: F,
) -> Result<(), SyncError>
where
    F: Fn(usize) -> W,
    W: FnOnce() + Send + 'static,
{
    for worker_id in 1..=workers {
        let job = make_worker(worker_id);
        let handle = thread::Builder::new()
            .name(format!("blocksync-worker-{worker_id}"))
            .spawn(job)?;
        manager.register(handle);
    }
    Ok(())
}

/// Common tail of every worker: classify the loop outcome, dispatch hooks.
/// Cancellation is a silent exit; anything else is reported through the
/// `error` hook. The `after` hook runs on every path.
pub(crate) fn finish_worker(
    worker_id: usize,
    result: Result<(), SyncError>,
    hooks: &Hooks,
    status: &Status,
) {
    match result {
        Ok(()) | Err(SyncError::Canceled) => {}
        Err(err) => {
            log::error!("[worker {worker_id}] {err}");
            hooks.run_error(&err, status);
        }
    }
    hooks.run_after(status);
}

/// Per-worker monitor pacing: dispatches the `monitor` hook once
/// `interval` has elapsed since the previous dispatch.
pub(crate) struct Monitor {
    interval: Duration,
    last: Instant,
}

impl Monitor {
    pub(crate) fn new(interval: Duration) -> Self {
        Monitor {
            interval,
            last: Instant::now(),
        }
    }

    pub(crate) fn tick(&mut self, hooks: &Hooks, status: &Status) {
        if self.last.elapsed() >= self.interval {
            hooks.run_monitor(status);
            self.last = Instant::now();
        }
    }
}

/// Optional inter-block throttle.
pub(crate) fn throttle(sync_interval: Duration) {
    if !sync_interval.is_zero() {
        thread::sleep(sync_interval);
    }
}
