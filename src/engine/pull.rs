//! Remote-to-local engine: remote digests from a read helper, local compare
//! and in-place rewrite.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::device::Device;
use crate::engine::hashing::HashAlgo;
use crate::engine::hooks::Hooks;
use crate::engine::manager::SyncManager;
use crate::engine::partition::WorkRange;
use crate::engine::status::{BlockKind, Status};
use crate::engine::{Monitor, SyncHandle, finish_worker, spawn_workers, throttle};
use crate::error::SyncError;
use crate::protocol::{DIFF, SKIP};
use crate::transport::{HelperChannel, Transport, ensure_helper, remote_size};
use crate::types::{RemoteOpts, SyncOpts};
use crate::utils::config::HelperConsts;

/// Synchronize remote `src` (on the far side of `transport`) onto local
/// `dest` in place.
pub fn remote_to_local(
    src: &str,
    dest: &Path,
    transport: Arc<dyn Transport>,
    remote: &RemoteOpts,
    opts: &SyncOpts,
    hooks: Hooks,
) -> Result<SyncHandle, SyncError> {
    let block_size = opts.block_size.resolve()?;
    if opts.workers == 0 {
        return Err(SyncError::Config("at least one worker is required".into()));
    }

    let read_command = ensure_helper(
        transport.as_ref(),
        remote.read_helper_command.as_deref(),
        remote.helper_dir.as_deref(),
        HelperConsts::READ_HELPER,
    )?;
    // Size-only probe session; each worker's own session re-reports it.
    let src_size = remote_size(transport.as_ref(), &read_command, src)?;

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
        let worker = PullWorker {
            worker_id,
            src: src.to_string(),
            dest: dest.to_path_buf(),
            transport: Arc::clone(&transport),
            read_command: read_command.clone(),
            dryrun: opts.dryrun,
            hash: opts.hash,
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

struct PullWorker {
    worker_id: usize,
    src: String,
    dest: PathBuf,
    transport: Arc<dyn Transport>,
    read_command: String,
    dryrun: bool,
    hash: HashAlgo,
    monitoring_interval: Duration,
    sync_interval: Duration,
    status: Arc<Status>,
    manager: Arc<SyncManager>,
    hooks: Arc<Hooks>,
}

impl PullWorker {
    fn run(self) {
        self.hooks.run_before();
        let result = self.sync();
        finish_worker(self.worker_id, result, &self.hooks, &self.status);
    }

    fn sync(&self) -> Result<(), SyncError> {
        let mut reader = self.transport.command(&self.read_command)?;
        reader.send_line(&self.src)?;
        let _ = reader.read_number()?;

        let WorkRange { startpos, maxblock } = WorkRange::for_worker(self.worker_id, &self.status);
        log::info!(
            "[worker {}] start sync(remote:{} -> {}), {maxblock} blocks from offset {startpos}",
            self.worker_id,
            self.src,
            self.dest.display(),
        );

        let block_size = self.status.block_size();
        reader.send_line(block_size)?;
        reader.send_line(self.hash.name())?;
        reader.send_line(startpos)?;
        reader.send_line(maxblock)?;

        let result = self.block_loop(&mut reader, startpos, maxblock);
        match result {
            Ok(()) | Err(SyncError::Canceled) => {
                reader.close()?;
                result
            }
            Err(_) => result,
        }
    }

    fn block_loop(
        &self,
        reader: &mut HelperChannel,
        startpos: u64,
        maxblock: u64,
    ) -> Result<(), SyncError> {
        let digest_len = self.hash.digest_len();
        let block_size = self.status.block_size();
        let src_size = self.status.src_size();
        let mut dest = Device::open_rw(&self.dest)?;
        dest.seek_to(startpos)?;

        let mut monitor = Monitor::new(self.monitoring_interval);
        for index in 0..maxblock {
            let Some(dest_block) = dest.read_block(block_size)? else {
                break;
            };
            self.manager.checkpoint(self.worker_id)?;

            let src_digest = reader.read_exact(digest_len, "block digest")?;
            let dest_digest = self.hash.digest(&dest_block);

            if src_digest == dest_digest {
                reader.send(&[SKIP])?;
                reader.flush()?;
                self.status.add(BlockKind::Same);
            } else {
                if self.dryrun {
                    reader.send(&[SKIP])?;
                    reader.flush()?;
                } else {
                    reader.send(&[DIFF])?;
                    reader.flush()?;
                    // The remote sends exactly what it read from the source,
                    // so the expected length follows from the source size.
                    let offset = startpos + index * block_size;
                    let expect = block_size.min(src_size.saturating_sub(offset));
                    let payload = reader.read_exact(expect as usize, "block payload")?;
                    dest.rewind_and_write(payload.len() as u64, &payload)?;
                }
                self.status.add(BlockKind::Diff);
            }

            monitor.tick(&self.hooks, &self.status);
            throttle(self.sync_interval);
        }
        Ok(())
    }
}
