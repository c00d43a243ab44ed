//! Optional lifecycle callbacks dispatched from worker threads.

use std::fmt;

use crate::engine::status::Status;
use crate::error::SyncError;

pub type BeforeHook = Box<dyn Fn() + Send + Sync>;
pub type StatusHook = Box<dyn Fn(&Status) + Send + Sync>;
pub type ErrorHook = Box<dyn Fn(&SyncError, &Status) + Send + Sync>;

/// Four optional callback slots. Every slot may be empty; dispatch is a
/// no-op then. Hooks run on worker threads, so they must be `Send + Sync`;
/// whatever they raise internally is the caller's responsibility.
#[derive(Default)]
pub struct Hooks {
    before: Option<BeforeHook>,
    after: Option<StatusHook>,
    monitor: Option<StatusHook>,
    error: Option<ErrorHook>,
}

impl Hooks {
    pub fn new() -> Self {
        Hooks::default()
    }

    /// Runs once per worker, before its handles are opened.
    pub fn on_before(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.before = Some(Box::new(f));
        self
    }

    /// Runs on every worker exit path: completion, cancel, failure.
    pub fn on_after(mut self, f: impl Fn(&Status) + Send + Sync + 'static) -> Self {
        self.after = Some(Box::new(f));
        self
    }

    /// Runs when `monitoring_interval` has elapsed since the last dispatch.
    pub fn on_monitor(mut self, f: impl Fn(&Status) + Send + Sync + 'static) -> Self {
        self.monitor = Some(Box::new(f));
        self
    }

    /// Runs when a worker loop fails with anything but cancellation.
    pub fn on_error(mut self, f: impl Fn(&SyncError, &Status) + Send + Sync + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    pub fn run_before(&self) {
        if let Some(hook) = &self.before {
            hook();
        }
    }

    pub fn run_after(&self, status: &Status) {
        if let Some(hook) = &self.after {
            hook(status);
        }
    }

    pub fn run_monitor(&self, status: &Status) {
        if let Some(hook) = &self.monitor {
            hook(status);
        }
    }

    pub fn run_error(&self, err: &SyncError, status: &Status) {
        if let Some(hook) = &self.error {
            hook(err, status);
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .field("monitor", &self.monitor.is_some())
            .field("error", &self.error.is_some())
            .finish()
    }
}
