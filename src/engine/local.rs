//! Local-to-local engine: whole-block compare-and-write on one machine.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::device::Device;
use crate::engine::hooks::Hooks;
use crate::engine::manager::SyncManager;
use crate::engine::partition::WorkRange;
use crate::engine::status::{BlockKind, Status};
use crate::engine::{Monitor, SyncHandle, finish_worker, spawn_workers, throttle};
use crate::error::SyncError;
use crate::types::SyncOpts;

/// Synchronize `src` onto `dest` in place, both local containers.
///
/// Returns as soon as the workers are spawned unless `opts.wait` is set.
pub fn local_to_local(
    src: &Path,
    dest: &Path,
    opts: &SyncOpts,
    hooks: Hooks,
) -> Result<SyncHandle, SyncError> {
    let block_size = opts.block_size.resolve()?;
    if opts.workers == 0 {
        return Err(SyncError::Config("at least one worker is required".into()));
    }
    if !src.exists() {
        return Err(SyncError::Config(format!("source {} does not exist", src.display())));
    }
    let src_size = Device::size_of(src)?;
    if opts.create_dest {
        Device::create_with_size(dest, src_size)?;
    }
    if !dest.exists() {
        return Err(SyncError::Config(format!(
            "destination {} does not exist (pass create_dest to create it)",
            dest.display()
        )));
    }

    let status = Arc::new(Status::new(opts.workers, block_size, src_size));
    status.set_dest_size(Device::size_of(dest)?);
    let manager = Arc::new(SyncManager::new());
    let hooks = Arc::new(hooks);

    spawn_workers(&manager, opts.workers, |worker_id| {
        let worker = LocalWorker {
            worker_id,
            src: src.to_path_buf(),
            dest: dest.to_path_buf(),
            dryrun: opts.dryrun,
            monitoring_interval: opts.monitoring_interval,
            sync_interval: opts.sync_interval,
            status: Arc::clone(&status),
            manager: Arc::clone(&manager),
            hooks: Arc::clone(&hooks),
        };
        move || worker.run()
    })?;

    if opts.wait {
        manager.wait();
    }
    Ok(SyncHandle::new(manager, status))
}

struct LocalWorker {
    worker_id: usize,
    src: PathBuf,
    dest: PathBuf,
    dryrun: bool,
    monitoring_interval: Duration,
    sync_interval: Duration,
    status: Arc<Status>,
    manager: Arc<SyncManager>,
    hooks: Arc<Hooks>,
}

impl LocalWorker {
    fn run(self) {
        self.hooks.run_before();
        let result = self.sync();
        finish_worker(self.worker_id, result, &self.hooks, &self.status);
    }

    fn sync(&self) -> Result<(), SyncError> {
        let WorkRange { startpos, maxblock } = WorkRange::for_worker(self.worker_id, &self.status);
        log::info!(
            "[worker {}] start sync({} -> {}), {maxblock} blocks from offset {startpos}",
            self.worker_id,
            self.src.display(),
            self.dest.display(),
        );

        let block_size = self.status.block_size();
        let mut src = Device::open_ro(&self.src)?;
        let mut dest = Device::open_rw(&self.dest)?;
        src.seek_to(startpos)?;
        dest.seek_to(startpos)?;

        let mut monitor = Monitor::new(self.monitoring_interval);
        for _ in 0..maxblock {
            // Zip-stop: the shorter container ends the loop.
            let Some(src_block) = src.read_block(block_size)? else {
                break;
            };
            let Some(dest_block) = dest.read_block(block_size)? else {
                break;
            };
            self.manager.checkpoint(self.worker_id)?;

            if src_block == dest_block {
                self.status.add(BlockKind::Same);
            } else {
                if !self.dryrun {
                    // Rewind over the bytes both sides actually covered.
                    let len = src_block
                        .len()
                        .min(dest_block.len())
                        .min(block_size as usize);
                    dest.rewind_and_write(len as u64, &src_block)?;
                }
                self.status.add(BlockKind::Diff);
            }

            monitor.tick(&self.hooks, &self.status);
            throttle(self.sync_interval);
        }
        Ok(())
    }
}
