//! Inode Block Map: resolves a file-relative block index to a physical
//! block number through the direct / single-indirect / double-indirect
//! pointer trees, allocating on demand (spec.md §4.5).
//!
//! Grounded on `kernel/src/fs/fs.rs`'s `bmap`, which walks the same three
//! regions (`NDIRECT`, then one indirect block, and in the xv6 original
//! only those two; fsx600 additionally has a double-indirect tier, walked
//! here the same way `bmap` walks its single indirect block, one level
//! deeper).

use crate::device::BlockDevice;
use crate::error::{Error, Result};
use crate::layout::{ptr_at, put_ptr, Inode, BLOCK_SIZE, N_DIRECT, PTRS_PER_BLOCK};
use crate::volume::Volume;

/// Where a just-written block pointer lives, so a failed allocation
/// sequence can be unwound precisely.
#[derive(Debug, Clone, Copy)]
enum PtrLoc {
    Direct(usize),
    Indir1,
    Indir2,
    Slot(u32, usize),
}

#[derive(Debug, Clone, Copy)]
struct Alloc {
    loc: PtrLoc,
    block: u32,
}

/// Resolves file-block `index` of inode `inum` to a physical block number.
///
/// If `allocate` is `false`, an unmapped index returns block `0` (a sparse
/// hole) instead of an error. If `allocate` is `true` and a pointer along
/// the way is unmapped, a fresh zeroed block is allocated and wired in;
/// each allocation is appended to `trail` so the caller can undo the
/// whole chain on a later failure (spec.md §9, extending-write rollback).
pub fn block_of<D: BlockDevice>(
    vol: &mut Volume<D>,
    inum: u32,
    index: u64,
    allocate: bool,
) -> Result<u32> {
    let mut actions = Vec::new();
    let result = block_of_inner(vol, inum, index, allocate, &mut actions);
    if result.is_err() {
        undo(vol, inum, &actions);
    }
    result.map(|(b, _)| b)
}

/// Same as [`block_of`] but returns the list of allocations it performed,
/// so the caller can roll them back itself if a *later* step in a larger
/// operation fails.
pub fn block_of_tracked<D: BlockDevice>(
    vol: &mut Volume<D>,
    inum: u32,
    index: u64,
    allocate: bool,
) -> Result<(u32, Vec<AllocRecord>)> {
    let mut actions = Vec::new();
    match block_of_inner(vol, inum, index, allocate, &mut actions) {
        Ok((b, _)) => Ok((b, actions.into_iter().map(AllocRecord).collect())),
        Err(e) => {
            undo(vol, inum, &actions);
            Err(e)
        }
    }
}

/// An opaque allocation record returned by [`block_of_tracked`]; pass a
/// slice of these to [`undo_allocations`] to reverse them.
#[derive(Debug, Clone, Copy)]
pub struct AllocRecord(Alloc);

/// Reverses a set of allocations performed by one or more
/// [`block_of_tracked`] calls, in reverse order: clears the pointer that
/// referenced each block, then frees the block.
pub fn undo_allocations<D: BlockDevice>(vol: &mut Volume<D>, inum: u32, records: &[AllocRecord]) {
    let actions: Vec<Alloc> = records.iter().map(|r| r.0).collect();
    undo(vol, inum, &actions);
}

fn block_of_inner<D: BlockDevice>(
    vol: &mut Volume<D>,
    inum: u32,
    index: u64,
    allocate: bool,
    actions: &mut Vec<Alloc>,
) -> Result<(u32, ())> {
    if index < N_DIRECT as u64 {
        let slot = index as usize;
        let mut inode = vol.get_inode(inum);
        let mut b = inode.direct[slot];
        if b == 0 {
            if !allocate {
                return Ok((0, ()));
            }
            b = alloc_zeroed(vol)?;
            inode.direct[slot] = b;
            vol.set_inode(inum, inode);
            actions.push(Alloc { loc: PtrLoc::Direct(slot), block: b });
        }
        return Ok((b, ()));
    }

    let index = index - N_DIRECT as u64;
    if index < PTRS_PER_BLOCK as u64 {
        let indir = ensure_indirect(vol, inum, true, allocate, actions)?;
        if indir == 0 {
            return Ok((0, ()));
        }
        let b = resolve_slot(vol, indir, index as usize, allocate, actions)?;
        return Ok((b, ()));
    }

    let index = index - PTRS_PER_BLOCK as u64;
    if index < (PTRS_PER_BLOCK as u64) * (PTRS_PER_BLOCK as u64) {
        let outer = ensure_indirect(vol, inum, false, allocate, actions)?;
        if outer == 0 {
            return Ok((0, ()));
        }
        let outer_idx = (index / PTRS_PER_BLOCK as u64) as usize;
        let inner_idx = (index % PTRS_PER_BLOCK as u64) as usize;
        let inner = resolve_slot(vol, outer, outer_idx, allocate, actions)?;
        if inner == 0 {
            return Ok((0, ()));
        }
        let b = resolve_slot(vol, inner, inner_idx, allocate, actions)?;
        return Ok((b, ()));
    }

    Err(Error::InvalidArgument)
}

fn ensure_indirect<D: BlockDevice>(
    vol: &mut Volume<D>,
    inum: u32,
    single: bool,
    allocate: bool,
    actions: &mut Vec<Alloc>,
) -> Result<u32> {
    let mut inode = vol.get_inode(inum);
    let existing = if single { inode.indir_1 } else { inode.indir_2 };
    if existing != 0 {
        return Ok(existing);
    }
    if !allocate {
        return Ok(0);
    }
    let b = alloc_zeroed(vol)?;
    if single {
        inode.indir_1 = b;
    } else {
        inode.indir_2 = b;
    }
    vol.set_inode(inum, inode);
    actions.push(Alloc { loc: if single { PtrLoc::Indir1 } else { PtrLoc::Indir2 }, block: b });
    Ok(b)
}

fn resolve_slot<D: BlockDevice>(
    vol: &mut Volume<D>,
    holder: u32,
    slot: usize,
    allocate: bool,
    actions: &mut Vec<Alloc>,
) -> Result<u32> {
    let mut buf = [0u8; BLOCK_SIZE];
    vol.read_data_block(holder, &mut buf)?;
    let mut b = ptr_at(&buf, slot);
    if b == 0 {
        if !allocate {
            return Ok(0);
        }
        b = alloc_zeroed(vol)?;
        put_ptr(&mut buf, slot, b);
        vol.write_data_block(holder, &buf)?;
        actions.push(Alloc { loc: PtrLoc::Slot(holder, slot), block: b });
    }
    Ok(b)
}

fn alloc_zeroed<D: BlockDevice>(vol: &mut Volume<D>) -> Result<u32> {
    let b = vol.alloc_block();
    if b == 0 {
        return Err(Error::NoSpace);
    }
    vol.write_data_block(b, &[0u8; BLOCK_SIZE])?;
    Ok(b)
}

fn undo<D: BlockDevice>(vol: &mut Volume<D>, inum: u32, actions: &[Alloc]) {
    for action in actions.iter().rev() {
        match action.loc {
            PtrLoc::Direct(slot) => {
                let mut inode = vol.get_inode(inum);
                inode.direct[slot] = 0;
                vol.set_inode(inum, inode);
            }
            PtrLoc::Indir1 => {
                let mut inode = vol.get_inode(inum);
                inode.indir_1 = 0;
                vol.set_inode(inum, inode);
            }
            PtrLoc::Indir2 => {
                let mut inode = vol.get_inode(inum);
                inode.indir_2 = 0;
                vol.set_inode(inum, inode);
            }
            PtrLoc::Slot(holder, slot) => {
                let mut buf = [0u8; BLOCK_SIZE];
                if vol.read_data_block(holder, &mut buf).is_ok() {
                    put_ptr(&mut buf, slot, 0);
                    let _ = vol.write_data_block(holder, &buf);
                }
            }
        }
        vol.free_block(action.block);
    }
}

/// Reads file-block `index` of inode `inum`. Unmapped indices (sparse
/// holes) read back as all zero, matching POSIX sparse-file semantics.
pub fn read_block<D: BlockDevice>(
    vol: &mut Volume<D>,
    inum: u32,
    index: u64,
) -> Result<[u8; BLOCK_SIZE]> {
    let b = block_of(vol, inum, index, false)?;
    let mut buf = [0u8; BLOCK_SIZE];
    if b != 0 {
        vol.read_data_block(b, &mut buf)?;
    }
    Ok(buf)
}

/// Frees every block reachable from `inode`'s direct, single-indirect, and
/// double-indirect trees, plus the indirect pointer blocks themselves.
/// Used by truncate-to-zero and unlink's last-reference reclaim.
pub fn free_all_blocks<D: BlockDevice>(vol: &mut Volume<D>, inode: &Inode) -> Result<()> {
    for &b in &inode.direct {
        if b != 0 {
            vol.free_block(b);
        }
    }
    if inode.indir_1 != 0 {
        free_indirect(vol, inode.indir_1)?;
    }
    if inode.indir_2 != 0 {
        let mut outer = [0u8; BLOCK_SIZE];
        vol.read_data_block(inode.indir_2, &mut outer)?;
        for i in 0..PTRS_PER_BLOCK {
            let inner = ptr_at(&outer, i);
            if inner != 0 {
                free_indirect(vol, inner)?;
            }
        }
        vol.free_block(inode.indir_2);
    }
    Ok(())
}

/// Frees every block at file-block index `>= keep`, shrinking `inode`'s
/// pointer trees in place (direct array, single- and double-indirect).
/// Pointer blocks that end up fully empty are freed too. The caller
/// persists `inode` afterward; this only mutates the in-memory copy and
/// the block/inode-map bitmaps.
pub fn free_from<D: BlockDevice>(vol: &mut Volume<D>, inode: &mut Inode, keep: u64) -> Result<()> {
    for (i, slot) in inode.direct.iter_mut().enumerate() {
        if i as u64 >= keep && *slot != 0 {
            vol.free_block(*slot);
            *slot = 0;
        }
    }

    if inode.indir_1 != 0 {
        let base = N_DIRECT as u64;
        let fully_gone = free_indirect_from(vol, inode.indir_1, keep.saturating_sub(base))?;
        if fully_gone && keep <= base {
            vol.free_block(inode.indir_1);
            inode.indir_1 = 0;
        }
    }

    if inode.indir_2 != 0 {
        let base = N_DIRECT as u64 + PTRS_PER_BLOCK as u64;
        let mut outer = [0u8; BLOCK_SIZE];
        vol.read_data_block(inode.indir_2, &mut outer)?;
        let mut outer_dirty = false;
        let mut outer_empty = true;
        for i in 0..PTRS_PER_BLOCK {
            let inner = ptr_at(&outer, i);
            if inner == 0 {
                continue;
            }
            let inner_base = keep.saturating_sub(base + (i as u64) * PTRS_PER_BLOCK as u64);
            let fully_gone = free_indirect_from(vol, inner, inner_base)?;
            if fully_gone && base + (i as u64) * PTRS_PER_BLOCK as u64 >= keep {
                vol.free_block(inner);
                put_ptr(&mut outer, i, 0);
                outer_dirty = true;
            } else {
                outer_empty = false;
            }
        }
        if outer_dirty {
            vol.write_data_block(inode.indir_2, &outer)?;
        }
        if outer_empty && base >= keep {
            vol.free_block(inode.indir_2);
            inode.indir_2 = 0;
        }
    }

    Ok(())
}

/// Frees slots at index `>= keep` within one indirect pointer block.
/// Returns `true` if every slot in the block ended up free.
fn free_indirect_from<D: BlockDevice>(vol: &mut Volume<D>, indir: u32, keep: u64) -> Result<bool> {
    let mut buf = [0u8; BLOCK_SIZE];
    vol.read_data_block(indir, &mut buf)?;
    let mut dirty = false;
    let mut all_free = true;
    for i in 0..PTRS_PER_BLOCK {
        let b = ptr_at(&buf, i);
        if b == 0 {
            continue;
        }
        if i as u64 >= keep {
            vol.free_block(b);
            put_ptr(&mut buf, i, 0);
            dirty = true;
        } else {
            all_free = false;
        }
    }
    if dirty {
        vol.write_data_block(indir, &buf)?;
    }
    Ok(all_free)
}

fn free_indirect<D: BlockDevice>(vol: &mut Volume<D>, indir: u32) -> Result<()> {
    let mut buf = [0u8; BLOCK_SIZE];
    vol.read_data_block(indir, &mut buf)?;
    for i in 0..PTRS_PER_BLOCK {
        let b = ptr_at(&buf, i);
        if b != 0 {
            vol.free_block(b);
        }
    }
    vol.free_block(indir);
    Ok(())
}
