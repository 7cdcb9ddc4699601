//! Directory Engine: directory contents are just a file whose blocks hold
//! fixed-size `Dirent` records, walked through the Inode Block Map like
//! any other file's data (spec.md §4.6).
//!
//! Grounded on `fs_util_dir.c`'s `get_dir_entry_in_block` /
//! `get_free_entry_in_block` / `get_dir_entry_block` /
//! `get_dir_free_entry_block` / `set_dir_entry` / `is_dir_empty`. The
//! directory inode's `size` there is a running count of entries ever
//! added minus ever removed, not a true highest-offset. `is_dir_empty`
//! trusts it outright rather than rescanning, and this port keeps that
//! behavior for fidelity.

use crate::blockmap;
use crate::device::BlockDevice;
use crate::error::{Error, Result};
use crate::layout::{Dirent, BLOCK_SIZE, DIRENTS_PER_BLOCK, DIRENT_SIZE};
use crate::volume::Volume;

/// A located directory entry: which block it lives in, its slot within
/// that block, and its decoded contents.
pub struct Located {
    pub block_no: u32,
    pub slot: usize,
    pub dirent: Dirent,
}

/// Searches `dir_inum` for `name`, without extending the directory.
pub fn find_entry<D: BlockDevice>(
    vol: &mut Volume<D>,
    dir_inum: u32,
    name: &str,
) -> Result<Option<Located>> {
    if !vol.get_inode(dir_inum).is_dir() {
        return Err(Error::NotDir);
    }
    let mut index = 0u64;
    loop {
        let block_no = blockmap::block_of(vol, dir_inum, index, false)?;
        if block_no == 0 {
            return Ok(None);
        }
        let mut buf = [0u8; BLOCK_SIZE];
        vol.read_data_block(block_no, &mut buf)?;
        for slot in 0..DIRENTS_PER_BLOCK {
            let de = Dirent::decode(&buf[slot * DIRENT_SIZE..(slot + 1) * DIRENT_SIZE]);
            if de.valid && de.name == name {
                return Ok(Some(Located { block_no, slot, dirent: de }));
            }
        }
        index += 1;
    }
}

/// Finds (or creates, extending the directory if necessary) a free slot.
fn find_free_slot<D: BlockDevice>(vol: &mut Volume<D>, dir_inum: u32) -> Result<(u32, usize)> {
    let mut index = 0u64;
    loop {
        let block_no = blockmap::block_of(vol, dir_inum, index, true)?;
        let mut buf = [0u8; BLOCK_SIZE];
        vol.read_data_block(block_no, &mut buf)?;
        for slot in 0..DIRENTS_PER_BLOCK {
            let de = Dirent::decode(&buf[slot * DIRENT_SIZE..(slot + 1) * DIRENT_SIZE]);
            if !de.valid {
                return Ok((block_no, slot));
            }
        }
        index += 1;
    }
}

/// Adds `name -> target_inum` to `dir_inum`, bumping `target_inum`'s link
/// count. Fails with `AlreadyExists` if `name` is already present.
pub fn make_entry<D: BlockDevice>(
    vol: &mut Volume<D>,
    dir_inum: u32,
    name: &str,
    target_inum: u32,
) -> Result<()> {
    if find_entry(vol, dir_inum, name)?.is_some() {
        return Err(Error::AlreadyExists);
    }
    let (block_no, slot) = find_free_slot(vol, dir_inum)?;

    let target = vol.get_inode(target_inum);
    let de = Dirent { valid: true, is_dir: target.is_dir(), inode: target_inum, name: name.to_string() };
    let mut buf = [0u8; BLOCK_SIZE];
    vol.read_data_block(block_no, &mut buf)?;
    de.encode_into(&mut buf[slot * DIRENT_SIZE..(slot + 1) * DIRENT_SIZE]);
    vol.write_data_block(block_no, &buf)?;

    let mut target = target;
    target.nlink += 1;
    vol.set_inode(target_inum, target);

    let mut dir = vol.get_inode(dir_inum);
    dir.size += DIRENT_SIZE as u32;
    vol.set_inode(dir_inum, dir);

    log::trace!("make_entry: added '{name}' -> inode {target_inum} in directory {dir_inum}");
    Ok(())
}

/// Removes `name` from `dir_inum`. Does not touch the target inode's
/// link count or reclaim its blocks; the caller (Operation Facade)
/// decides what happens once `nlink` reaches zero.
pub fn unlink_entry<D: BlockDevice>(vol: &mut Volume<D>, dir_inum: u32, name: &str) -> Result<Dirent> {
    let located = find_entry(vol, dir_inum, name)?.ok_or(Error::NotFound)?;

    let mut buf = [0u8; BLOCK_SIZE];
    vol.read_data_block(located.block_no, &mut buf)?;
    Dirent::INVALID.encode_into(&mut buf[located.slot * DIRENT_SIZE..(located.slot + 1) * DIRENT_SIZE]);
    vol.write_data_block(located.block_no, &buf)?;

    let mut dir = vol.get_inode(dir_inum);
    dir.size = dir.size.saturating_sub(DIRENT_SIZE as u32);
    vol.set_inode(dir_inum, dir);

    log::trace!("unlink_entry: removed '{name}' from directory {dir_inum}");
    Ok(located.dirent)
}

/// True if `dir_inum`'s only entries are `.` and `..`.
pub fn is_empty<D: BlockDevice>(vol: &mut Volume<D>, dir_inum: u32) -> Result<bool> {
    let inode = vol.get_inode(dir_inum);
    if !inode.is_dir() {
        return Err(Error::NotDir);
    }
    Ok(inode.size <= 2 * DIRENT_SIZE as u32)
}

/// All valid entries of `dir_inum`, in on-disk order.
pub fn list_entries<D: BlockDevice>(vol: &mut Volume<D>, dir_inum: u32) -> Result<Vec<Dirent>> {
    if !vol.get_inode(dir_inum).is_dir() {
        return Err(Error::NotDir);
    }
    let mut entries = Vec::new();
    let mut index = 0u64;
    loop {
        let block_no = blockmap::block_of(vol, dir_inum, index, false)?;
        if block_no == 0 {
            break;
        }
        let mut buf = [0u8; BLOCK_SIZE];
        vol.read_data_block(block_no, &mut buf)?;
        for slot in 0..DIRENTS_PER_BLOCK {
            let de = Dirent::decode(&buf[slot * DIRENT_SIZE..(slot + 1) * DIRENT_SIZE]);
            if de.valid {
                entries.push(de);
            }
        }
        index += 1;
    }
    Ok(entries)
}
