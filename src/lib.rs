//! Blocksync: in-place differential synchronization of byte containers.
//!
//! Compares a source and a destination (regular files or block devices) in
//! fixed-size blocks and rewrites only the blocks that differ, partitioned
//! across parallel workers. Three engines cover the placement combinations:
//!
//! - [`local_to_local`]: byte-for-byte compare on one machine.
//! - [`local_to_remote`]: local hashing against a remote read helper, diff
//!   payloads streamed to a remote write helper.
//! - [`remote_to_local`]: remote digests in, local compare and rewrite.
//!
//! The remote helpers are tiny standalone binaries driven over any stream
//! duplex a [`transport::Transport`] can open (ssh in practice). Every run
//! shares one [`Status`] across its workers and can be suspended, resumed,
//! and canceled through the returned [`SyncHandle`].
//!
//! ```no_run
//! use blocksync::{Hooks, SyncOpts};
//! use std::path::Path;
//!
//! let opts = SyncOpts {
//!     block_size: "64KiB".into(),
//!     workers: 4,
//!     create_dest: true,
//!     wait: true,
//!     ..SyncOpts::default()
//! };
//! let hooks = Hooks::new().on_monitor(|status| println!("{:.1}%", status.rate()));
//! let handle = blocksync::local_to_local(
//!     Path::new("/dev/vg0/source"),
//!     Path::new("/mnt/backup/source.img"),
//!     &opts,
//!     hooks,
//! )?;
//! let blocks = handle.status().blocks();
//! println!("same {} diff {}", blocks.same, blocks.diff);
//! # Ok::<(), blocksync::SyncError>(())
//! ```

pub mod device;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod types;
pub mod utils;

pub use engine::{
    BlockKind, Blocks, HashAlgo, Hooks, Status, SyncHandle, SyncManager, WorkRange,
    local_to_local, local_to_remote, remote_to_local,
};
pub use error::SyncError;
pub use transport::{CommandTransport, Transport};
pub use types::{BlockSize, RemoteOpts, SyncOpts};
