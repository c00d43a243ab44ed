//! Shared progress counters for one sync run.

use serde::Serialize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of per-block progress. `done` is kept equal to `same + diff`
/// under the status lock, so a snapshot is always internally consistent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Blocks {
    pub same: u64,
    pub diff: u64,
    pub done: u64,
}

/// Classification of one processed block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockKind {
    Same,
    Diff,
}

/// Progress aggregate shared by all workers of one sync run.
///
/// Created by the driver, mutated concurrently by workers through
/// [`Status::add`], read by the `monitor` hook and the final consumer.
#[derive(Debug)]
pub struct Status {
    workers: usize,
    block_size: u64,
    src_size: u64,
    chunk_size: u64,
    dest_size: AtomicU64,
    blocks: Mutex<Blocks>,
}

impl Status {
    pub fn new(workers: usize, block_size: u64, src_size: u64) -> Self {
        Status {
            workers,
            block_size,
            src_size,
            chunk_size: src_size / workers as u64,
            dest_size: AtomicU64::new(0),
            blocks: Mutex::new(Blocks::default()),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn src_size(&self) -> u64 {
        self.src_size
    }

    /// Bytes assigned to each worker except the last, which also takes the
    /// remainder.
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Destination size. Zero until learned; the remote engines only learn it
    /// from the reader handshake after workers have started.
    pub fn dest_size(&self) -> u64 {
        self.dest_size.load(Ordering::Relaxed)
    }

    pub fn set_dest_size(&self, size: u64) {
        self.dest_size.store(size, Ordering::Relaxed);
    }

    /// Record one processed block.
    pub fn add(&self, kind: BlockKind) {
        let mut blocks = self.blocks.lock().unwrap();
        match kind {
            BlockKind::Same => blocks.same += 1,
            BlockKind::Diff => blocks.diff += 1,
        }
        blocks.done = blocks.same + blocks.diff;
    }

    /// Consistent snapshot of the counters.
    pub fn blocks(&self) -> Blocks {
        *self.blocks.lock().unwrap()
    }

    /// Total number of whole blocks in the source, floor division, at least 1
    /// once the source is non-empty.
    pub fn total_blocks(&self) -> u64 {
        (self.src_size / self.block_size).max(u64::from(self.src_size > 0))
    }

    /// Completion rate in percent, clamped to `[0, 100]`. Zero until the
    /// first block is counted.
    pub fn rate(&self) -> f64 {
        let done = self.blocks().done;
        if done == 0 {
            return 0.0;
        }
        let total = self.total_blocks();
        (done as f64 / total as f64 * 100.0).min(100.0)
    }
}
