//! Write helper: runs at the remote end of a sync, driven over stdio.
//!
//! Consumes a per-block directive stream and writes or skips each block in
//! place; see `blocksync::protocol::serve_write` for the script it speaks.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdin = io::stdin().lock();
    match blocksync::protocol::serve_write(&mut stdin) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("blocksync-write-helper: {err}");
            ExitCode::FAILURE
        }
    }
}
