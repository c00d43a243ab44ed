//! Public option records for the sync drivers.

use std::path::PathBuf;
use std::time::Duration;

use crate::engine::hashing::HashAlgo;
use crate::error::SyncError;
use crate::utils::bytesize::parse_byte_size;
use crate::utils::config::SyncDefaults;

/// Block size as the caller supplied it: literal bytes or a human-readable
/// form such as `"64KiB"`. Resolved once at driver entry.
#[derive(Clone, Debug)]
pub enum BlockSize {
    Bytes(u64),
    Readable(String),
}

impl BlockSize {
    /// Resolve to bytes; a zero block size is rejected.
    pub fn resolve(&self) -> Result<u64, SyncError> {
        let bytes = match self {
            BlockSize::Bytes(n) => *n,
            BlockSize::Readable(s) => parse_byte_size(s)?,
        };
        if bytes == 0 {
            return Err(SyncError::Config("block size must be positive".into()));
        }
        Ok(bytes)
    }
}

impl Default for BlockSize {
    fn default() -> Self {
        BlockSize::Bytes(SyncDefaults::BLOCK_SIZE)
    }
}

impl From<u64> for BlockSize {
    fn from(bytes: u64) -> Self {
        BlockSize::Bytes(bytes)
    }
}

impl From<&str> for BlockSize {
    fn from(s: &str) -> Self {
        BlockSize::Readable(s.to_string())
    }
}

impl From<String> for BlockSize {
    fn from(s: String) -> Self {
        BlockSize::Readable(s)
    }
}

/// Per-call sync configuration shared by all three drivers.
#[derive(Clone, Debug)]
pub struct SyncOpts {
    /// Block granularity for comparison and rewrite.
    pub block_size: BlockSize,
    /// Number of parallel workers; each gets a disjoint byte range.
    pub workers: usize,
    /// Create/truncate the destination to the source size first.
    pub create_dest: bool,
    /// Join all workers before the driver returns.
    pub wait: bool,
    /// Classify blocks but never write to the destination.
    pub dryrun: bool,
    /// Digest algorithm for the remote engines.
    pub hash: HashAlgo,
    /// Minimum time between `monitor` hook dispatches per worker.
    pub monitoring_interval: Duration,
    /// Optional sleep after each block, to throttle I/O pressure.
    pub sync_interval: Duration,
}

impl Default for SyncOpts {
    fn default() -> Self {
        SyncOpts {
            block_size: BlockSize::default(),
            workers: SyncDefaults::WORKERS,
            create_dest: false,
            wait: false,
            dryrun: false,
            hash: HashAlgo::default(),
            monitoring_interval: Duration::from_secs_f64(SyncDefaults::MONITORING_INTERVAL_SECS),
            sync_interval: Duration::ZERO,
        }
    }
}

/// Remote-engine extras: helper commands and where to find the payloads.
#[derive(Clone, Debug, Default)]
pub struct RemoteOpts {
    /// Pre-installed read-helper command on the remote side. When `None`,
    /// the helper binary is uploaded through the transport and run as
    /// `./blocksync-read-helper`.
    pub read_helper_command: Option<String>,
    /// Same for the write helper.
    pub write_helper_command: Option<String>,
    /// Directory holding the local helper binaries to upload. Defaults to
    /// the directory of the running executable.
    pub helper_dir: Option<PathBuf>,
}
