//! Error types for sync drivers, workers, and the helper protocol.

use thiserror::Error;

/// Everything that can go wrong during a sync run.
///
/// Inside a worker loop every variant except [`SyncError::Canceled`] is
/// passed to the `error` hook and terminates that worker only; sibling
/// workers keep running. `Canceled` unwinds the loop silently.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid caller input: unparseable block size, zero workers, bad hash name.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Open/read/write/seek/truncate failure on a local container.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A helper stream delivered fewer bytes than the protocol requires,
    /// or a byte that is not a directive.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The remote channel could not be spawned, written, or read.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Cooperative cancellation observed at a suspension point.
    #[error("sync canceled")]
    Canceled,
}

impl SyncError {
    /// Shorthand for a [`SyncError::Protocol`] about a stream that ended early.
    pub(crate) fn short_read(what: &str, want: usize, got: usize) -> Self {
        SyncError::Protocol(format!(
            "{what}: expected {want} bytes, stream ended after {got}"
        ))
    }
}
