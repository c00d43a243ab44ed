//! Block digest algorithms for the remote engines.
//!
//! The algorithm name travels over the wire in the read-helper handshake, so
//! both ends must agree on the same set of names.

use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::str::FromStr;

use crate::error::SyncError;

/// Digest algorithm applied to whole blocks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HashAlgo {
    #[default]
    Sha256,
    Sha512,
    Blake3,
}

impl HashAlgo {
    /// Length in bytes of the raw digest this algorithm emits.
    pub fn digest_len(&self) -> usize {
        match self {
            HashAlgo::Sha256 => 32,
            HashAlgo::Sha512 => 64,
            HashAlgo::Blake3 => 32,
        }
    }

    /// Raw binary digest of one block.
    pub fn digest(&self, block: &[u8]) -> Vec<u8> {
        match self {
            HashAlgo::Sha256 => Sha256::digest(block).to_vec(),
            HashAlgo::Sha512 => Sha512::digest(block).to_vec(),
            HashAlgo::Blake3 => blake3::hash(block).as_bytes().to_vec(),
        }
    }

    /// Wire name, as sent in the read-helper handshake.
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgo::Sha256 => "sha256",
            HashAlgo::Sha512 => "sha512",
            HashAlgo::Blake3 => "blake3",
        }
    }
}

impl fmt::Display for HashAlgo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgo {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha256" => Ok(HashAlgo::Sha256),
            "sha512" => Ok(HashAlgo::Sha512),
            "blake3" => Ok(HashAlgo::Blake3),
            other => Err(SyncError::Config(format!("unknown hash algorithm {other:?}"))),
        }
    }
}
