//! Maps a worker id onto its byte range and block count.

use crate::engine::status::Status;

/// Per-worker assignment: first byte offset and maximum number of blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkRange {
    pub startpos: u64,
    pub maxblock: u64,
}

impl WorkRange {
    /// Assignment for `worker_id` (1-based). Each worker gets
    /// `src_size / workers` bytes starting at `(worker_id - 1) * chunk`; the
    /// last worker also takes the remainder, so the ranges tile
    /// `[0, src_size)`. `maxblock` is the chunk rounded up to whole blocks;
    /// only the last worker's final block may be short.
    pub fn for_worker(worker_id: usize, status: &Status) -> WorkRange {
        let chunk = status.chunk_size();
        let startpos = chunk * (worker_id as u64 - 1);
        let mut bytes = chunk;
        if worker_id == status.workers() {
            bytes += status.src_size() % status.workers() as u64;
        }
        let maxblock = bytes.div_ceil(status.block_size());
        WorkRange { startpos, maxblock }
    }
}
