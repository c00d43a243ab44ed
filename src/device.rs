//! Byte-container access: regular files and block devices behind one handle.
//!
//! Sizes are taken with seek-to-end rather than `stat`, because a block
//! device node reports a zero length to `stat` while seek-to-end reports the
//! device capacity.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// An open read-write handle on a source or destination container.
///
/// Each worker owns its own `Device` on the shared underlying container and
/// stays inside its assigned byte range.
#[derive(Debug)]
pub struct Device {
    path: PathBuf,
    file: File,
}

impl Device {
    /// Open an existing file or device node for read and write.
    pub fn open_rw(path: &Path) -> io::Result<Device> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Device {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Open read-only (sufficient for sources that are never written).
    pub fn open_ro(path: &Path) -> io::Result<Device> {
        let file = File::open(path)?;
        Ok(Device {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Container size via seek-to-end; the cursor is restored to offset 0.
    pub fn size(&mut self) -> io::Result<u64> {
        let size = self.file.seek(SeekFrom::End(0))?;
        self.file.rewind()?;
        Ok(size)
    }

    pub fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Read up to `block_size` bytes at the current position. Returns `None`
    /// at end of container; the final block may be short.
    pub fn read_block(&mut self, block_size: u64) -> io::Result<Option<Vec<u8>>> {
        let mut block = vec![0u8; block_size as usize];
        let mut filled = 0;
        while filled < block.len() {
            match self.file.read(&mut block[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        if filled == 0 {
            return Ok(None);
        }
        block.truncate(filled);
        Ok(Some(block))
    }

    /// Seek back by `len` from the current position and write `data` there.
    /// Used to overwrite the block that was just read and found different.
    pub fn rewind_and_write(&mut self, len: u64, data: &[u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Current(-(len as i64)))?;
        self.file.write_all(data)?;
        self.file.flush()
    }

    /// Advance the cursor by `len` without touching the content.
    pub fn seek_forward(&mut self, len: u64) -> io::Result<()> {
        self.file.seek(SeekFrom::Current(len as i64))?;
        Ok(())
    }

    /// Write `data` at the current position.
    pub fn write_block(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_all(data)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }

    /// Lazy sequence of blocks from the current position to the end.
    pub fn blocks(self, block_size: u64) -> BlockIter {
        BlockIter {
            device: self,
            block_size,
        }
    }

    /// Create `path` if needed and set its length to exactly `size` bytes.
    pub fn create_with_size(path: &Path, size: u64) -> io::Result<()> {
        let file = OpenOptions::new().write(true).create(true).open(path)?;
        file.set_len(size)
    }

    /// Size of the container at `path` without keeping a handle open.
    pub fn size_of(path: &Path) -> io::Result<u64> {
        Device::open_ro(path)?.size()
    }
}

/// Iterator over consecutive blocks of a [`Device`], consuming the handle.
#[derive(Debug)]
pub struct BlockIter {
    device: Device,
    block_size: u64,
}

impl Iterator for BlockIter {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.device.read_block(self.block_size).transpose()
    }
}
