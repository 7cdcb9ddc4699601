//! Volume State: an owned, mounted filesystem image.
//!
//! The original core keeps a handful of process-wide statics: `struct
//! unixfs fs` holding the superblock, an in-memory inode-map/block-map
//! pair, and the resident inode array, initialized once by `fs_mount`
//! (`fs_util_meta.c`) and torn down by `fs_unmount`. Per spec.md §9's
//! redesign note, that global gets turned into a value: `Volume<D>` owns
//! the device plus every in-memory mirror, and is threaded explicitly
//! through every operation instead of reached via a static.
//!
//! Layout of metadata blocks, ascending from block 0 (spec.md §3):
//! superblock, inode bitmap, block bitmap, inode region, then data blocks.

use crate::bitmap::Bitmap;
use crate::device::BlockDevice;
use crate::dirty::DirtyCache;
use crate::error::Result;
use crate::layout::{
    Inode, Superblock, BITS_PER_BLOCK, BLOCK_SIZE, INODES_PER_BLOCK, INODE_SIZE,
};

/// A mounted filesystem image: the device plus every in-memory mirror of
/// its metadata.
pub struct Volume<D: BlockDevice> {
    device: D,
    sb: Superblock,
    pub(crate) inode_map: Bitmap,
    pub(crate) block_map: Bitmap,
    inodes: Vec<Inode>,
    pub(crate) dirty: DirtyCache,
}

impl<D: BlockDevice> Volume<D> {
    /// Mounts `device`: reads the superblock, both bitmaps, and the whole
    /// inode region into memory. Fails hard (`Error::Io`, via
    /// `Superblock::decode`) on a magic mismatch (spec.md §4.2).
    pub fn mount(mut device: D) -> Result<Self> {
        let mut sb_buf = [0u8; BLOCK_SIZE];
        device.read_one(0, &mut sb_buf)?;
        let sb = Superblock::decode(&sb_buf)?;

        let inode_map_base = 1u32;
        let block_map_base = inode_map_base + sb.inode_map_size;
        let inode_region_base = block_map_base + sb.block_map_size;

        let inode_map_bytes = read_region(&mut device, inode_map_base, sb.inode_map_size)?;
        let block_map_bytes = read_region(&mut device, block_map_base, sb.block_map_size)?;
        let inode_region_bytes =
            read_region(&mut device, inode_region_base, sb.inode_region_size)?;

        let n_inodes = sb.inode_region_size as usize * INODES_PER_BLOCK;
        let mut inodes = Vec::with_capacity(n_inodes);
        for i in 0..n_inodes {
            let off = i * INODE_SIZE;
            inodes.push(Inode::decode(&inode_region_bytes[off..off + INODE_SIZE]));
        }

        let inode_map = Bitmap::new(inode_map_bytes, sb.inode_map_size as usize * BITS_PER_BLOCK);
        let block_map = Bitmap::new(block_map_bytes, sb.block_map_size as usize * BITS_PER_BLOCK);

        log::debug!(
            "mounted volume: {} blocks total, {} inodes, n_meta={}",
            sb.num_blocks,
            n_inodes,
            sb.n_meta()
        );

        Ok(Volume { device, sb, inode_map, block_map, inodes, dirty: DirtyCache::new() })
    }

    /// Writes every dirty metadata block back to the device, in ascending
    /// block-number order, then clears the dirty cache (spec.md §4.3, §5).
    pub fn flush_metadata(&mut self) -> Result<()> {
        let pending: Vec<u32> = self.dirty.iter_ascending().collect();
        for block_no in pending {
            let buf = self.encode_meta_block(block_no);
            self.device.write_one(block_no, &buf)?;
        }
        self.dirty.clear();
        Ok(())
    }

    pub fn superblock(&self) -> &Superblock {
        &self.sb
    }

    pub fn num_blocks(&self) -> u32 {
        self.sb.num_blocks
    }

    pub fn num_inodes(&self) -> u32 {
        self.inodes.len() as u32
    }

    pub fn free_blocks(&self) -> u32 {
        self.block_map.free_count() as u32
    }

    pub fn free_inodes(&self) -> u32 {
        // Inode 0 is permanently marked used at mkfs time, so it is
        // already excluded from this count.
        self.inode_map.free_count() as u32
    }

    pub fn get_inode(&self, inum: u32) -> Inode {
        self.inodes[inum as usize]
    }

    pub fn set_inode(&mut self, inum: u32, inode: Inode) {
        self.inodes[inum as usize] = inode;
        self.mark_inode_dirty(inum);
    }

    pub(crate) fn mark_inode_dirty(&mut self, inum: u32) {
        let block = self.inode_region_base() + (inum as usize / INODES_PER_BLOCK) as u32;
        self.dirty.mark(block);
    }

    /// First data block number, i.e. `n_meta`.
    pub fn data_base(&self) -> u32 {
        self.sb.n_meta()
    }

    pub(crate) fn inode_map_base(&self) -> u32 {
        1
    }

    pub(crate) fn block_map_base(&self) -> u32 {
        self.inode_map_base() + self.sb.inode_map_size
    }

    pub(crate) fn inode_region_base(&self) -> u32 {
        self.block_map_base() + self.sb.block_map_size
    }

    /// Reads a data block (including indirect pointer blocks) straight
    /// from the device. Unlike metadata, data blocks are never cached;
    /// spec.md §4.1 reserves the dirty cache for metadata alone.
    pub fn read_data_block(&mut self, block_no: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
        self.device.read_one(block_no, buf)
    }

    /// Writes a data block straight through to the device.
    pub fn write_data_block(&mut self, block_no: u32, buf: &[u8; BLOCK_SIZE]) -> Result<()> {
        self.device.write_one(block_no, buf)
    }

    fn encode_meta_block(&self, block_no: u32) -> [u8; BLOCK_SIZE] {
        if block_no == 0 {
            return self.sb.encode();
        }
        let block_map_base = self.block_map_base();
        let inode_region_base = self.inode_region_base();

        if block_no < block_map_base {
            let idx = (block_no - self.inode_map_base()) as usize;
            return bytes_block(self.inode_map.bytes(), idx);
        }
        if block_no < inode_region_base {
            let idx = (block_no - block_map_base) as usize;
            return bytes_block(self.block_map.bytes(), idx);
        }

        let idx = (block_no - inode_region_base) as usize;
        let mut buf = [0u8; BLOCK_SIZE];
        let base_inum = idx * INODES_PER_BLOCK;
        for slot in 0..INODES_PER_BLOCK {
            let inum = base_inum + slot;
            if inum < self.inodes.len() {
                self.inodes[inum].encode_into(&mut buf[slot * INODE_SIZE..(slot + 1) * INODE_SIZE]);
            }
        }
        buf
    }
}

fn read_region<D: BlockDevice>(device: &mut D, base: u32, n_blocks: u32) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; n_blocks as usize * BLOCK_SIZE];
    if n_blocks > 0 {
        device.read(base, n_blocks, &mut buf)?;
    }
    Ok(buf)
}

fn bytes_block(src: &[u8], idx: usize) -> [u8; BLOCK_SIZE] {
    let mut buf = [0u8; BLOCK_SIZE];
    let start = idx * BLOCK_SIZE;
    if start < src.len() {
        let end = (start + BLOCK_SIZE).min(src.len());
        buf[..end - start].copy_from_slice(&src[start..end]);
    }
    buf
}
