//! Human-readable byte size grammar for block sizes.
//!
//! Accepted forms: a bare decimal integer (bytes), or `<digits><unit>` where
//! unit is one of `B`, `KB`, `MB`, `GB` (powers of 1000) or `K`, `KiB`, `M`,
//! `MiB`, `G`, `GiB` (powers of 1024).

use crate::error::SyncError;

const KB: u64 = 1000;
const MB: u64 = KB * KB;
const GB: u64 = KB * KB * KB;
const KIB: u64 = 1 << 10;
const MIB: u64 = 1 << 20;
const GIB: u64 = 1 << 30;

fn unit_multiplier(unit: &str) -> Option<u64> {
    // Bare K/M/G are binary, like the common dd/mkfs convention.
    match unit {
        "B" => Some(1),
        "KB" => Some(KB),
        "MB" => Some(MB),
        "GB" => Some(GB),
        "K" | "KiB" => Some(KIB),
        "M" | "MiB" => Some(MIB),
        "G" | "GiB" => Some(GIB),
        _ => None,
    }
}

/// Parse a byte size such as `4096`, `64KiB`, `1MB`, or `2G`.
///
/// ```
/// use blocksync::utils::parse_byte_size;
/// assert_eq!(parse_byte_size("1MB").unwrap(), 1_000_000);
/// assert_eq!(parse_byte_size("1MiB").unwrap(), 1 << 20);
/// ```
pub fn parse_byte_size(s: &str) -> Result<u64, SyncError> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    if digits.is_empty() {
        return Err(SyncError::Config(format!("invalid byte size {s:?}")));
    }
    let value: u64 = digits
        .parse()
        .map_err(|_| SyncError::Config(format!("invalid byte size {s:?}")))?;
    if unit.is_empty() {
        return Ok(value);
    }
    let multiplier = unit_multiplier(unit)
        .ok_or_else(|| SyncError::Config(format!("unknown byte size unit {unit:?} in {s:?}")))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| SyncError::Config(format!("byte size {s:?} overflows u64")))
}
