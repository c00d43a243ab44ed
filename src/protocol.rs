//! Wire protocol between the local driver and the remote helpers, plus the
//! helper server loops themselves.
//!
//! The stream is a mix of LF-terminated ASCII decimal lines (handshakes),
//! single directive bytes, raw fixed-size digests, and raw block payloads.
//! It is strictly request-response: the driver never sends the next
//! directive before consuming the current digest.
//!
//! DIFF payloads are exactly `block_size` bytes, except the final payload of
//! a worker's run, which may be shorter and is delimited by the driver
//! closing the stream right after its loop. [`read_payload`] therefore fills
//! up to `block_size` and tolerates end-of-stream.

use std::io::{BufRead, ErrorKind, Read, Write};
use std::path::Path;

use crate::device::Device;
use crate::engine::hashing::HashAlgo;
use crate::error::SyncError;

/// Legacy token for an unchanged block; never sent by current workers.
pub const SAME: u8 = b'0';
/// Directive: nothing needed for this block, advance.
pub const SKIP: u8 = b'1';
/// Directive: block payload follows (to the write helper) or is requested
/// (from the read helper).
pub const DIFF: u8 = b'2';

/// Read one LF-terminated line; `None` when the stream ended first.
pub fn read_line_opt<R: BufRead>(input: &mut R) -> Result<Option<String>, SyncError> {
    let mut line = String::new();
    let n = input.read_line(&mut line)?;
    if n == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Read one LF-terminated line; errors if the stream ends first.
pub fn read_line<R: BufRead>(input: &mut R) -> Result<String, SyncError> {
    read_line_opt(input)?
        .ok_or_else(|| SyncError::Protocol("stream ended while expecting a line".into()))
}

/// Read one LF-terminated ASCII decimal line.
pub fn read_number<R: BufRead>(input: &mut R) -> Result<u64, SyncError> {
    let line = read_line(input)?;
    line.trim()
        .parse()
        .map_err(|_| SyncError::Protocol(format!("expected a decimal line, got {line:?}")))
}

pub fn write_line<W: Write>(output: &mut W, value: impl std::fmt::Display) -> Result<(), SyncError> {
    writeln!(output, "{value}")?;
    Ok(())
}

/// Read exactly `len` bytes; a shorter stream is a protocol violation.
pub fn read_exact<R: Read>(input: &mut R, len: usize, what: &str) -> Result<Vec<u8>, SyncError> {
    let mut buf = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        match input.read(&mut buf[filled..]) {
            Ok(0) => return Err(SyncError::short_read(what, len, filled)),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(buf)
}

/// Fill up to `limit` bytes, stopping early only at end-of-stream.
pub fn read_payload<R: Read>(input: &mut R, limit: u64) -> Result<Vec<u8>, SyncError> {
    let mut buf = vec![0u8; limit as usize];
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    buf.truncate(filled);
    Ok(buf)
}

/// Read one directive byte. `None` means the driver closed the stream and
/// the helper should exit cleanly; any byte other than SKIP/DIFF is a
/// protocol violation.
pub fn read_directive<R: Read>(input: &mut R) -> Result<Option<u8>, SyncError> {
    let mut byte = [0u8; 1];
    loop {
        match input.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    match byte[0] {
        SKIP | DIFF => Ok(Some(byte[0])),
        other => Err(SyncError::Protocol(format!("not a directive byte: 0x{other:02x}"))),
    }
}

/// Read-helper server loop. Runs at the remote end over stdio; generic over
/// the streams so it is testable in process.
///
/// Script: `path\n` -> emit `size\n` -> `block_size\n hash_algo\n startpos\n
/// maxblock\n` -> `maxblock` rounds of digest out, one directive in, and the
/// raw block out when the directive is DIFF.
pub fn serve_read<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<(), SyncError> {
    let path = read_line(input)?;
    let mut file = Device::open_ro(Path::new(&path))?;
    let size = file.size()?;
    write_line(output, size)?;
    output.flush()?;

    // End-of-stream here is a size-only probe, not an error.
    let Some(line) = read_line_opt(input)? else {
        return Ok(());
    };
    let block_size: u64 = line
        .trim()
        .parse()
        .map_err(|_| SyncError::Protocol(format!("expected a decimal line, got {line:?}")))?;
    let algo: HashAlgo = read_line(input)?.parse()?;
    let startpos = read_number(input)?;
    let maxblock = read_number(input)?;

    file.seek_to(startpos)?;
    for _ in 0..maxblock {
        let block = file.read_block(block_size)?.unwrap_or_default();
        output.write_all(&algo.digest(&block))?;
        output.flush()?;
        match read_directive(input)? {
            None => break,
            Some(DIFF) => {
                output.write_all(&block)?;
                output.flush()?;
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Write-helper server loop. Runs at the remote end over stdio.
///
/// Script: `path\n create_size\n block_size\n startpos\n maxblock\n` ->
/// `maxblock` rounds of one directive in, plus the payload when DIFF.
pub fn serve_write<R: BufRead>(input: &mut R) -> Result<(), SyncError> {
    let path = read_line(input)?;
    let create_size = read_number(input)?;
    if create_size > 0 {
        Device::create_with_size(Path::new(&path), create_size)?;
    }

    let block_size = read_number(input)?;
    let startpos = read_number(input)?;
    let maxblock = read_number(input)?;

    let mut file = Device::open_rw(Path::new(&path))?;
    file.seek_to(startpos)?;
    for _ in 0..maxblock {
        match read_directive(input)? {
            None => break,
            Some(SKIP) => file.seek_forward(block_size)?,
            Some(_) => {
                let payload = read_payload(input, block_size)?;
                if payload.is_empty() {
                    break;
                }
                file.write_block(&payload)?;
                // A short payload is only legal as the final block; the
                // driver closes the stream right after it.
                if (payload.len() as u64) < block_size {
                    break;
                }
            }
        }
    }
    file.flush()?;
    Ok(())
}
