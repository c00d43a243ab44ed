//! Application configuration constants.
//! Defaults and tuning in one place.

// ---- Sync defaults ----

/// Defaults applied by `SyncOpts::default()` and the CLI.
pub struct SyncDefaults;

impl SyncDefaults {
    /// Default block size in bytes (1 MiB).
    pub const BLOCK_SIZE: u64 = 1 << 20;
    /// Default worker count.
    pub const WORKERS: usize = 1;
    /// Default hash algorithm name on the wire.
    pub const HASH: &'static str = "sha256";
    /// Seconds between `monitor` hook dispatches per worker.
    pub const MONITORING_INTERVAL_SECS: f64 = 1.0;
}

// ---- Remote helpers ----

/// Names of the helper binaries: local build artifacts and the file names
/// they are uploaded under on the remote side.
pub struct HelperConsts;

impl HelperConsts {
    pub const READ_HELPER: &'static str = "blocksync-read-helper";
    pub const WRITE_HELPER: &'static str = "blocksync-write-helper";
}

// ---- CLI ----

/// Name of the optional CLI config file, looked up in the working directory.
pub const CONFIG_FILENAME: &str = ".blocksync.toml";
