use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// In-place differential block synchronization.
#[derive(Clone, Parser)]
#[command(name = "blocksync")]
#[command(about = "Synchronize byte containers block by block; only differing blocks are written.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Subcommand)]
pub enum Commands {
    /// Sync between two local containers.
    Local {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Sync a local source onto a remote destination.
    Push {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Sync a remote source onto a local destination.
    Pull {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        remote: RemoteArgs,
    },
}

#[derive(Args, Clone)]
pub struct CommonArgs {
    /// Source container: a local path, or the remote path for `pull`.
    #[arg(value_name = "SRC")]
    pub src: String,

    /// Destination container: a local path, or the remote path for `push`.
    #[arg(value_name = "DEST")]
    pub dest: String,

    /// Block size, e.g. `4096`, `64KiB`, `1MB`. Default: 1MiB.
    #[arg(long, short = 'b')]
    pub block_size: Option<String>,

    /// Parallel workers, each owning a disjoint byte range. Default: 1.
    #[arg(long, short = 'w')]
    pub workers: Option<usize>,

    /// Create/truncate the destination to the source size first.
    #[arg(long)]
    pub create_dest: bool,

    /// Classify blocks as same/diff without writing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Digest algorithm for the remote modes: sha256, sha512, blake3.
    #[arg(long)]
    pub hash: Option<String>,

    /// Seconds between progress updates per worker. Default: 1.
    #[arg(long)]
    pub monitoring_interval: Option<f64>,

    /// Seconds to sleep after each block (I/O throttle). Default: 0.
    #[arg(long)]
    pub sync_interval: Option<f64>,

    /// Print the final counters as JSON on stdout.
    #[arg(long)]
    pub json: bool,

    /// Verbose output. Default: false.
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

#[derive(Args, Clone)]
pub struct RemoteArgs {
    /// Transport command prefix, e.g. `ssh user@host` or `ssh -p 2222 host`.
    /// Without it, helpers run on this machine through `sh -c`.
    #[arg(long)]
    pub ssh: Option<String>,

    /// Pre-installed read-helper command on the remote side. Skips the upload.
    #[arg(long)]
    pub read_helper: Option<String>,

    /// Pre-installed write-helper command on the remote side. Skips the upload.
    #[arg(long)]
    pub write_helper: Option<String>,

    /// Directory holding the helper binaries to upload. Default: the
    /// directory of this executable.
    #[arg(long)]
    pub helper_dir: Option<PathBuf>,
}
