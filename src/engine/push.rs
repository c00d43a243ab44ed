//! Local-to-remote engine: local hashing against a remote read helper, with
//! diff payloads streamed to a remote write helper.

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
use crate::transport::{HelperChannel, Transport, ensure_helper};
use crate::types::{RemoteOpts, SyncOpts};
use crate::utils::config::HelperConsts;

/// Synchronize local `src` onto `dest` on the far side of `transport`.
///
/// Each worker drives its own read-helper/write-helper session pair against
/// the same destination path.
pub fn local_to_remote(
    src: &Path,
    dest: &str,
    transport: Arc<dyn Transport>,
    remote: &RemoteOpts,
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

    let read_command = ensure_helper(
        transport.as_ref(),
        remote.read_helper_command.as_deref(),
        remote.helper_dir.as_deref(),
        HelperConsts::READ_HELPER,
    )?;
    let write_command = ensure_helper(
        transport.as_ref(),
        remote.write_helper_command.as_deref(),
        remote.helper_dir.as_deref(),
        HelperConsts::WRITE_HELPER,
    )?;

    if opts.create_dest {
        // One dedicated session, before any reader opens the file; per-worker
        // creation would race the readers' opens.
        create_remote(transport.as_ref(), &write_command, dest, src_size, block_size)?;
    }

    let status = Arc::new(Status::new(opts.workers, block_size, src_size));
    let manager = Arc::new(SyncManager::new());
    let hooks = Arc::new(hooks);

    spawn_workers(&manager, opts.workers, |worker_id| {
        let worker = PushWorker {
            worker_id,
            src: src.to_path_buf(),
            dest: dest.to_string(),
            transport: Arc::clone(&transport),
            read_command: read_command.clone(),
            write_command: write_command.clone(),
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

/// Create/truncate the remote destination through a write-helper session
/// with an empty block loop.
fn create_remote(
    transport: &dyn Transport,
    write_command: &str,
    dest: &str,
    size: u64,
    block_size: u64,
) -> Result<(), SyncError> {
    let mut writer = transport.command(write_command)?;
    writer.send_line(dest)?;
    writer.send_line(size)?;
    writer.send_line(block_size)?;
    writer.send_line(0)?;
    writer.send_line(0)?;
    writer.close()
}

struct PushWorker {
    worker_id: usize,
    src: PathBuf,
    dest: String,
    transport: Arc<dyn Transport>,
    read_command: String,
    write_command: String,
    dryrun: bool,
    hash: HashAlgo,
    monitoring_interval: Duration,
    sync_interval: Duration,
    status: Arc<Status>,
    manager: Arc<SyncManager>,
    hooks: Arc<Hooks>,
}

impl PushWorker {
    fn run(self) {
        self.hooks.run_before();
        let result = self.sync();
        finish_worker(self.worker_id, result, &self.hooks, &self.status);
    }

    fn sync(&self) -> Result<(), SyncError> {
        let mut reader = self.transport.command(&self.read_command)?;
        let mut writer = self.transport.command(&self.write_command)?;

        // Creation already happened in the driver; workers never truncate.
        writer.send_line(&self.dest)?;
        writer.send_line(0)?;
        reader.send_line(&self.dest)?;
        let dest_size = reader.read_number()?;
        self.status.set_dest_size(dest_size);

        let WorkRange { startpos, maxblock } = WorkRange::for_worker(self.worker_id, &self.status);
        log::info!(
            "[worker {}] start sync({} -> remote:{}), {maxblock} blocks from offset {startpos}",
            self.worker_id,
            self.src.display(),
            self.dest,
        );

        let block_size = self.status.block_size();
        reader.send_line(block_size)?;
        reader.send_line(self.hash.name())?;
        reader.send_line(startpos)?;
        reader.send_line(maxblock)?;
        writer.send_line(block_size)?;
        writer.send_line(startpos)?;
        writer.send_line(maxblock)?;

        let result = self.block_loop(&mut reader, &mut writer, startpos, maxblock);
        match result {
            // The loop stopped at a frame boundary; let the helpers see a
            // clean end-of-stream and check how they exited.
            Ok(()) | Err(SyncError::Canceled) => {
                reader.close()?;
                writer.close()?;
                result
            }
            Err(_) => result,
        }
    }

    fn block_loop(
        &self,
        reader: &mut HelperChannel,
        writer: &mut HelperChannel,
        startpos: u64,
        maxblock: u64,
    ) -> Result<(), SyncError> {
        let digest_len = self.hash.digest_len();
        let block_size = self.status.block_size();
        let mut src = Device::open_ro(&self.src)?;
        src.seek_to(startpos)?;
        let mut blocks = src.blocks(block_size);

        let mut monitor = Monitor::new(self.monitoring_interval);
        for _ in 0..maxblock {
            let Some(src_block) = blocks.next().transpose()? else {
                break;
            };
            self.manager.checkpoint(self.worker_id)?;

            let src_digest = self.hash.digest(&src_block);
            let dest_digest = reader.read_exact(digest_len, "block digest")?;
            // The reader gets exactly one directive per digest; we never
            // need its raw blocks in this direction.
            reader.send(&[SKIP])?;
            reader.flush()?;

            if src_digest == dest_digest {
                writer.send(&[SKIP])?;
                self.status.add(BlockKind::Same);
            } else {
                if self.dryrun {
                    writer.send(&[SKIP])?;
                } else {
                    writer.send(&[DIFF])?;
                    writer.send(&src_block)?;
                }
                self.status.add(BlockKind::Diff);
            }
            writer.flush()?;

            monitor.tick(&self.hooks, &self.status);
            throttle(self.sync_interval);
        }
        Ok(())
    }
}
