//! Block Device I/O: fixed-size block read/write over a raw image.
//!
//! No caching happens here; the Dirty Cache (`dirty.rs`) is the only
//! cache the core provides, per spec.md §4.1. Mirrors the two operations
//! `mkfs/src/main.rs`'s `rsect`/`wsect` perform directly against a
//! `std::fs::File`, generalized into a trait so the core can also run
//! against an in-memory buffer in tests.

use crate::error::{Error, Result};
use crate::layout::BLOCK_SIZE;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

/// A block-addressed storage device: fixed `BLOCK_SIZE`-byte blocks,
/// numbered from 0.
pub trait BlockDevice {
    /// Reads `n_blocks` contiguous blocks starting at `block_no` into
    /// `dest`, which must be exactly `n_blocks * BLOCK_SIZE` bytes.
    fn read(&mut self, block_no: u32, n_blocks: u32, dest: &mut [u8]) -> Result<()>;

    /// Writes `n_blocks` contiguous blocks starting at `block_no` from
    /// `src`, which must be exactly `n_blocks * BLOCK_SIZE` bytes.
    fn write(&mut self, block_no: u32, n_blocks: u32, src: &[u8]) -> Result<()>;

    /// Reads a single block.
    fn read_one(&mut self, block_no: u32, dest: &mut [u8; BLOCK_SIZE]) -> Result<()> {
        self.read(block_no, 1, dest)
    }

    /// Writes a single block.
    fn write_one(&mut self, block_no: u32, src: &[u8; BLOCK_SIZE]) -> Result<()> {
        self.write(block_no, 1, src)
    }
}

/// A `BlockDevice` backed by a raw image file.
pub struct FileDevice {
    file: File,
}

impl FileDevice {
    pub fn new(file: File) -> Self {
        FileDevice { file }
    }

    fn seek_to(&mut self, block_no: u32) -> Result<()> {
        let off = block_no as u64 * BLOCK_SIZE as u64;
        self.file.seek(SeekFrom::Start(off)).map_err(Error::from)?;
        Ok(())
    }
}

impl BlockDevice for FileDevice {
    fn read(&mut self, block_no: u32, n_blocks: u32, dest: &mut [u8]) -> Result<()> {
        let want = n_blocks as usize * BLOCK_SIZE;
        if dest.len() != want {
            return Err(Error::InvalidArgument);
        }
        self.seek_to(block_no)?;
        self.file.read_exact(dest).map_err(Error::from)
    }

    fn write(&mut self, block_no: u32, n_blocks: u32, src: &[u8]) -> Result<()> {
        let want = n_blocks as usize * BLOCK_SIZE;
        if src.len() != want {
            return Err(Error::InvalidArgument);
        }
        self.seek_to(block_no)?;
        self.file.write_all(src).map_err(Error::from)
    }
}

/// An in-memory `BlockDevice`, used by tests and by anything that wants to
/// mount a volume without touching the real filesystem.
pub struct MemDevice {
    blocks: Vec<u8>,
}

impl MemDevice {
    pub fn new(num_blocks: u32) -> Self {
        MemDevice { blocks: vec![0u8; num_blocks as usize * BLOCK_SIZE] }
    }
}

impl BlockDevice for MemDevice {
    fn read(&mut self, block_no: u32, n_blocks: u32, dest: &mut [u8]) -> Result<()> {
        let start = block_no as usize * BLOCK_SIZE;
        let want = n_blocks as usize * BLOCK_SIZE;
        if dest.len() != want || start + want > self.blocks.len() {
            return Err(Error::Io);
        }
        dest.copy_from_slice(&self.blocks[start..start + want]);
        Ok(())
    }

    fn write(&mut self, block_no: u32, n_blocks: u32, src: &[u8]) -> Result<()> {
        let start = block_no as usize * BLOCK_SIZE;
        let want = n_blocks as usize * BLOCK_SIZE;
        if src.len() != want || start + want > self.blocks.len() {
            return Err(Error::Io);
        }
        self.blocks[start..start + want].copy_from_slice(src);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_device_round_trips_a_block() {
        let mut dev = MemDevice::new(8);
        let mut buf = [0u8; BLOCK_SIZE];
        buf[0] = 0xab;
        buf[BLOCK_SIZE - 1] = 0xcd;
        dev.write_one(3, &buf).unwrap();

        let mut out = [0u8; BLOCK_SIZE];
        dev.read_one(3, &mut out).unwrap();
        assert_eq!(buf, out);
    }

    #[test]
    fn mem_device_rejects_out_of_range() {
        let mut dev = MemDevice::new(2);
        let buf = [0u8; BLOCK_SIZE];
        assert!(dev.write_one(5, &buf).is_err());
    }
}
