//! File I/O: byte-range read/write and truncate over a regular file's
//! block tree (spec.md §4.7).
//!
//! Grounded on `fs_util_file.c`'s `do_read`/`do_write`/`do_truncate`: read
//! clips to EOF, write rejects an `offset` past the current end of file
//! (no sparse holes created by write, spec.md §9), and truncate only
//! shrinks. This port replaces the original's ad hoc block-number
//! arithmetic in `do_truncate` with `blockmap::free_from`, and adds the
//! rollback-on-partial-allocation-failure policy spec.md §9 calls for:
//! `do_write` in the original leaves newly allocated blocks in place if a
//! later chunk of the same call hits `ENOSPC`; this one undoes them.

use crate::blockmap::{self, AllocRecord};
use crate::device::BlockDevice;
use crate::error::{Error, Result};
use crate::layout::{Inode, BLOCK_SIZE};
use crate::volume::Volume;

/// Reads up to `buf.len()` bytes of `inum`'s content starting at `offset`.
/// Returns the number of bytes actually copied: `0` if `offset` is at or
/// past the end of file, otherwise clipped to EOF.
pub fn read<D: BlockDevice>(vol: &mut Volume<D>, inum: u32, offset: u64, buf: &mut [u8]) -> Result<usize> {
    let inode = vol.get_inode(inum);
    if !inode.is_regular() && !inode.is_dir() && !inode.is_symlink() {
        return Err(Error::InvalidArgument);
    }
    let size = inode.size as u64;
    if offset >= size {
        return Ok(0);
    }
    let len = buf.len().min((size - offset) as usize);
    let mut done = 0usize;
    while done < len {
        let pos = offset + done as u64;
        let block_index = pos / BLOCK_SIZE as u64;
        let in_block = (pos % BLOCK_SIZE as u64) as usize;
        let block = blockmap::read_block(vol, inum, block_index)?;
        let take = (BLOCK_SIZE - in_block).min(len - done);
        buf[done..done + take].copy_from_slice(&block[in_block..in_block + take]);
        done += take;
    }
    Ok(done)
}

/// Writes `data` to `inum` starting at `offset`. `offset` must not exceed
/// the current size; writes may only extend a file by appending at EOF,
/// never create a hole (spec.md §9, matching the original's contract).
///
/// On `NoSpace` partway through, every block this call allocated is freed
/// and the inode is left exactly as it was before the call.
pub fn write<D: BlockDevice>(vol: &mut Volume<D>, inum: u32, offset: u64, data: &[u8]) -> Result<usize> {
    let original = vol.get_inode(inum);
    if !original.is_regular() && !original.is_symlink() {
        return Err(Error::InvalidArgument);
    }
    if offset > original.size as u64 {
        return Err(Error::InvalidArgument);
    }

    let mut allocations: Vec<AllocRecord> = Vec::new();
    let mut done = 0usize;
    let mut new_size = original.size as u64;

    while done < data.len() {
        let pos = offset + done as u64;
        let block_index = pos / BLOCK_SIZE as u64;
        let in_block = (pos % BLOCK_SIZE as u64) as usize;

        let block_no = match blockmap::block_of_tracked(vol, inum, block_index, true) {
            Ok((b, recs)) => {
                allocations.extend(recs);
                b
            }
            Err(e) => {
                blockmap::undo_allocations(vol, inum, &allocations);
                vol.set_inode(inum, original);
                return Err(e);
            }
        };

        let mut block = [0u8; BLOCK_SIZE];
        if vol.read_data_block(block_no, &mut block).is_err() {
            blockmap::undo_allocations(vol, inum, &allocations);
            vol.set_inode(inum, original);
            return Err(Error::Io);
        }

        let take = (BLOCK_SIZE - in_block).min(data.len() - done);
        block[in_block..in_block + take].copy_from_slice(&data[done..done + take]);
        if vol.write_data_block(block_no, &block).is_err() {
            blockmap::undo_allocations(vol, inum, &allocations);
            vol.set_inode(inum, original);
            return Err(Error::Io);
        }

        done += take;
        new_size = new_size.max(pos + take as u64);
    }

    let mut inode = vol.get_inode(inum);
    inode.size = new_size as u32;
    inode.mtime = crate::clock::now();
    vol.set_inode(inum, inode);
    log::trace!("write: {done} bytes to inode {inum} at offset {offset}");
    Ok(done)
}

/// Shrinks `inum` to `new_len` bytes, freeing every block beyond the new
/// end. `new_len` must not exceed the current size (spec.md §9: truncate
/// never extends).
pub fn truncate<D: BlockDevice>(vol: &mut Volume<D>, inum: u32, new_len: u32) -> Result<()> {
    let mut inode = vol.get_inode(inum);
    if !inode.is_regular() && !inode.is_dir() {
        return Err(Error::InvalidArgument);
    }
    if new_len > inode.size {
        return Err(Error::InvalidArgument);
    }

    if new_len == 0 {
        blockmap::free_all_blocks(vol, &inode)?;
        inode.direct = [0; crate::layout::N_DIRECT];
        inode.indir_1 = 0;
        inode.indir_2 = 0;
    } else {
        let keep_blocks = (new_len as u64 + BLOCK_SIZE as u64 - 1) / BLOCK_SIZE as u64;
        blockmap::free_from(vol, &mut inode, keep_blocks)?;
    }

    inode.size = new_len;
    inode.mtime = crate::clock::now();
    vol.set_inode(inum, inode);
    log::trace!("truncate: inode {inum} to {new_len} bytes");
    Ok(())
}

/// POSIX `stat`-equivalent metadata snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub inum: u32,
    pub mode: u32,
    pub nlink: u32,
    pub uid: u16,
    pub gid: u16,
    pub size: u32,
    pub blocks_512: u32,
    pub mtime: u32,
    pub ctime: u32,
}

pub fn stat(inode: &Inode, inum: u32) -> Stat {
    Stat {
        inum,
        mode: inode.mode,
        nlink: inode.nlink,
        uid: inode.uid,
        gid: inode.gid,
        size: inode.size,
        blocks_512: (inode.size + 511) / 512,
        mtime: inode.mtime,
        ctime: inode.ctime,
    }
}
