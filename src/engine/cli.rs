//! CLI command handlers: build options, wire hooks to a progress bar, run
//! one sync and report the outcome.

use anyhow::{Context, Result, bail};
use kdam::{Bar, BarExt};
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::engine::arg_parser::{CommonArgs, RemoteArgs};
use crate::engine::{Hooks, Status, SyncHandle};
use crate::transport::{CommandTransport, Transport};
use crate::types::{RemoteOpts, SyncOpts};
use crate::utils::blocksync_toml::{SyncSection, load_blocksync_toml};
use crate::utils::setup_logging;

/// Merge `.blocksync.toml` (when present) under the CLI flags and build the
/// sync options. Also initializes logging.
fn setup_opts(common: &CommonArgs) -> Result<(SyncOpts, SyncSection)> {
    let section: SyncSection = load_blocksync_toml(Path::new("."))
        .map(|file| file.sync)
        .unwrap_or_default();
    setup_logging(common.verbose || section.verbose.unwrap_or(false));

    let mut opts = SyncOpts::default();
    if let Some(bs) = common.block_size.clone().or_else(|| section.block_size.clone()) {
        opts.block_size = bs.into();
    }
    if let Some(workers) = common.workers.or(section.workers) {
        opts.workers = workers;
    }
    if let Some(hash) = common.hash.as_deref().or(section.hash.as_deref()) {
        opts.hash = hash.parse()?;
    }
    opts.create_dest = common.create_dest;
    opts.dryrun = common.dry_run;
    if let Some(secs) = common.monitoring_interval {
        opts.monitoring_interval = Duration::from_secs_f64(secs);
    }
    if let Some(secs) = common.sync_interval {
        opts.sync_interval = Duration::from_secs_f64(secs);
    }
    // The CLI joins the workers itself so the main thread installs the
    // Ctrl-C handler before blocking.
    opts.wait = false;
    Ok((opts, section))
}

fn transport_for(remote: &RemoteArgs, section: &SyncSection) -> Result<Arc<dyn Transport>> {
    let transport = match remote.ssh.as_deref().or(section.ssh.as_deref()) {
        Some(line) => CommandTransport::from_command_line(line)?,
        None => CommandTransport::local(),
    };
    Ok(Arc::new(transport))
}

fn remote_opts(remote: &RemoteArgs) -> RemoteOpts {
    RemoteOpts {
        read_helper_command: remote.read_helper.clone(),
        write_helper_command: remote.write_helper.clone(),
        helper_dir: remote.helper_dir.clone(),
    }
}

/// Progress hook: non-blocking bar update via try_lock, so a contended bar
/// never stalls a worker.
fn progress_hooks(bar: &Arc<Mutex<Bar>>) -> Hooks {
    let monitor_bar = Arc::clone(bar);
    Hooks::new()
        .on_monitor(move |status: &Status| {
            if let Ok(mut bar) = monitor_bar.try_lock() {
                bar.total = status.total_blocks() as usize;
                let _ = bar.update_to(status.blocks().done as usize);
            }
        })
        .on_error(|err, status| {
            log::error!(
                "worker failed after {} blocks: {err}",
                status.blocks().done
            );
        })
}

#[derive(Serialize)]
struct Summary {
    same: u64,
    diff: u64,
    done: u64,
    rate: f64,
    dryrun: bool,
}

/// Join the run, keep Ctrl-C cooperative, and print the final counters.
fn drive(handle: &SyncHandle, bar: &Arc<Mutex<Bar>>, json: bool, dryrun: bool) -> Result<()> {
    let manager = Arc::clone(handle.manager());
    ctrlc::set_handler(move || {
        log::warn!("interrupt: canceling sync");
        manager.cancel();
    })
    .context("installing the Ctrl-C handler")?;

    handle.wait();

    let status = handle.status();
    if let Ok(mut bar) = bar.lock() {
        bar.total = status.total_blocks() as usize;
        let _ = bar.update_to(status.blocks().done as usize);
        let _ = bar.refresh();
        eprintln!();
    }

    let blocks = status.blocks();
    if json {
        let summary = Summary {
            same: blocks.same,
            diff: blocks.diff,
            done: blocks.done,
            rate: status.rate(),
            dryrun,
        };
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        log::info!(
            "done: {} blocks same, {} rewritten ({:.1}%)",
            blocks.same,
            blocks.diff,
            status.rate()
        );
    }
    if blocks.done < status.total_blocks() {
        bail!("sync incomplete: {}/{} blocks", blocks.done, status.total_blocks());
    }
    Ok(())
}

fn make_bar() -> Arc<Mutex<Bar>> {
    Arc::new(Mutex::new(kdam::tqdm!(
        total = 0,
        desc = "sync",
        unit = " blocks"
    )))
}

pub fn handle_local(common: &CommonArgs) -> Result<()> {
    let (opts, _) = setup_opts(common)?;
    let bar = make_bar();
    let handle = crate::engine::local_to_local(
        Path::new(&common.src),
        Path::new(&common.dest),
        &opts,
        progress_hooks(&bar),
    )?;
    drive(&handle, &bar, common.json, opts.dryrun)
}

pub fn handle_push(common: &CommonArgs, remote: &RemoteArgs) -> Result<()> {
    let (opts, section) = setup_opts(common)?;
    let transport = transport_for(remote, &section)?;
    let bar = make_bar();
    let handle = crate::engine::local_to_remote(
        Path::new(&common.src),
        &common.dest,
        transport,
        &remote_opts(remote),
        &opts,
        progress_hooks(&bar),
    )?;
    drive(&handle, &bar, common.json, opts.dryrun)
}

pub fn handle_pull(common: &CommonArgs, remote: &RemoteArgs) -> Result<()> {
    let (opts, section) = setup_opts(common)?;
    let transport = transport_for(remote, &section)?;
    let bar = make_bar();
    let handle = crate::engine::remote_to_local(
        &common.src,
        Path::new(&common.dest),
        transport,
        &remote_opts(remote),
        &opts,
        progress_hooks(&bar),
    )?;
    drive(&handle, &bar, common.json, opts.dryrun)
}
