//! Dirty Cache: tracks which metadata blocks have diverged from disk.
//!
//! The original C core (`fs_util_meta.c`) keeps `fs.dirty[n_meta]`, a flat
//! array of pointers indexed by absolute block number, and flushes it by
//! scanning in ascending order so bitmap writes land before the inode
//! writes that depend on them (spec.md §4.3, §5). `Volume` owns the actual
//! metadata buffers directly, so here the cache only needs to remember
//! *which* absolute block numbers are dirty, in ascending order; `flush`
//! (in `volume.rs`) looks the bytes up itself. A `BTreeSet` gives both the
//! dedupe-on-repeated-mark behavior and the ascending scan order for free.

use std::collections::BTreeSet;

/// Set of dirty absolute block numbers, always iterated in ascending
/// order so bitmap blocks (which sit before the inode region in the
/// on-disk layout) are flushed first.
#[derive(Debug, Default)]
pub struct DirtyCache {
    dirty: BTreeSet<u32>,
}

impl DirtyCache {
    pub fn new() -> Self {
        DirtyCache { dirty: BTreeSet::new() }
    }

    /// Marks absolute block `block_no` dirty.
    pub fn mark(&mut self, block_no: u32) {
        self.dirty.insert(block_no);
    }

    pub fn is_dirty(&self, block_no: u32) -> bool {
        self.dirty.contains(&block_no)
    }

    pub fn is_empty(&self) -> bool {
        self.dirty.is_empty()
    }

    /// Ascending absolute block numbers currently dirty.
    pub fn iter_ascending(&self) -> impl Iterator<Item = u32> + '_ {
        self.dirty.iter().copied()
    }

    /// Clears the cache after a successful flush.
    pub fn clear(&mut self) {
        self.dirty.clear();
    }
}
