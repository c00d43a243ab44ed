//! Read helper: runs at the remote end of a sync, driven over stdio.
//!
//! Streams per-block digests of a container and raw blocks on demand; see
//! `blocksync::protocol::serve_read` for the script it speaks.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdin = io::stdin().lock();
    let mut stdout = io::stdout().lock();
    match blocksync::protocol::serve_read(&mut stdin, &mut stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("blocksync-read-helper: {err}");
            ExitCode::FAILURE
        }
    }
}
