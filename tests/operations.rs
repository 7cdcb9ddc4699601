//! Integration tests driving `fsx600` purely through `ops`, covering
//! spec.md §8's S1-S6 scenarios and its general testable properties.

use fsx600::device::MemDevice;
use fsx600::layout::{
    file_type, Superblock, BLOCK_SIZE, DIRENT_SIZE, FS_MAGIC, N_DIRECT, PTRS_PER_BLOCK, ROOT_INODE,
};
use fsx600::{dir, ops, Error, Inode, Volume};

/// Builds a freshly "formatted" image: superblock + bitmaps + inode
/// region sized for the test, with inode 0 and the root directory (inode
/// 1) marked used and wired up with its own `.`/`..`, the way `mkfs`
/// would leave it.
fn fresh_volume(n_inode_blocks: u32, n_data_blocks: u32) -> Volume<MemDevice> {
    let inode_map_size = 1;
    let block_map_size = 1;
    let total = 1 + inode_map_size + block_map_size + n_inode_blocks + n_data_blocks;
    let mut dev = MemDevice::new(total);

    let sb = Superblock {
        magic: FS_MAGIC,
        inode_map_size,
        inode_region_size: n_inode_blocks,
        block_map_size,
        num_blocks: total,
        root_inode: ROOT_INODE,
    };
    dev.write_one(0, &sb.encode()).unwrap();

    let mut imap = [0u8; BLOCK_SIZE];
    imap[0] = 0b0000_0011; // inode 0 reserved, inode 1 = root
    dev.write_one(1, &imap).unwrap();
    let n_meta = 1 + inode_map_size + block_map_size + n_inode_blocks;
    dev.write_one(2, &test_block_map(n_meta, total)).unwrap();
    for b in 0..n_inode_blocks {
        dev.write_one(3 + b, &[0u8; BLOCK_SIZE]).unwrap();
    }

    let mut vol = Volume::mount(dev).unwrap();
    let mut root = Inode::ZEROED;
    root.mode = file_type::S_IFDIR | 0o755;
    root.nlink = 2;
    vol.set_inode(ROOT_INODE, root);
    dir::make_entry(&mut vol, ROOT_INODE, ".", ROOT_INODE).unwrap();
    dir::make_entry(&mut vol, ROOT_INODE, "..", ROOT_INODE).unwrap();
    vol.flush_metadata().unwrap();
    vol
}

/// A block bitmap with metadata blocks `[0, n_meta)` and every bit past
/// `total` marked used, leaving only `[n_meta, total)` free. Matches the
/// way a real `mkfs` pads a bitmap block past the volume's actual block
/// count.
fn test_block_map(n_meta: u32, total: u32) -> [u8; BLOCK_SIZE] {
    let mut bmap = [0u8; BLOCK_SIZE];
    for b in 0..n_meta {
        bmap[(b / 8) as usize] |= 1 << (b % 8);
    }
    for b in total..(BLOCK_SIZE as u32 * 8) {
        bmap[(b / 8) as usize] |= 1 << (b % 8);
    }
    bmap
}

#[test]
fn s1_fresh_root_reports_expected_attrs_and_free_space() {
    let mut vol = fresh_volume(2, 16);
    let st = ops::getattr(&mut vol, "/").unwrap();
    assert_eq!(st.mode & file_type::S_IFMT, file_type::S_IFDIR);
    assert_eq!(st.size, 2 * DIRENT_SIZE as u32);

    let info = ops::statfs(&vol);
    // root's own directory block is the only one consumed so far.
    assert_eq!(info.free_blocks, info.total_blocks - vol.data_base() - 1);
}

#[test]
fn s2_nested_mkdir_touch_write_read() {
    let mut vol = fresh_volume(2, 16);
    ops::mkdir(&mut vol, "/a", 0o755).unwrap();
    ops::mkdir(&mut vol, "/a/b", 0o755).unwrap();
    ops::mknod(&mut vol, "/a/b/f", 0o644).unwrap();
    ops::write(&mut vol, "/a/b/f", 0, b"hello").unwrap();

    let mut buf = [0u8; 5];
    let n = ops::read(&mut vol, "/a/b/f", 0, &mut buf).unwrap();
    assert_eq!(n, 5);
    assert_eq!(&buf, b"hello");
    assert_eq!(ops::getattr(&mut vol, "/a/b/f").unwrap().size, 5);
}

#[test]
fn s3_write_spans_direct_indirect_and_double_indirect() {
    // 6 direct + 256 single-indirect + 1 byte into double-indirect, plus
    // the pointer blocks themselves (indir_1, indir_2, one inner block).
    let data_blocks = N_DIRECT as u32 + 1 + PTRS_PER_BLOCK as u32 + 1 + 1 + 4;
    let mut vol = fresh_volume(2, data_blocks);
    ops::mknod(&mut vol, "/big", 0o644).unwrap();

    let len = (N_DIRECT + PTRS_PER_BLOCK) * BLOCK_SIZE + 1;
    let payload = vec![0x5a_u8; len];
    ops::write(&mut vol, "/big", 0, &payload).unwrap();

    let inum = ops::getattr(&mut vol, "/big").unwrap().inum;
    let inode = vol.get_inode(inum);
    assert!(inode.direct.iter().all(|&b| b != 0), "all 6 direct pointers populated");
    assert_ne!(inode.indir_1, 0, "single-indirect pointer block allocated");
    assert_ne!(inode.indir_2, 0, "double-indirect pointer block allocated");

    let mut out = vec![0u8; len];
    ops::read(&mut vol, "/big", 0, &mut out).unwrap();
    assert_eq!(out, payload);
}

#[test]
fn s4_symlink_readlink_and_transparent_traversal() {
    let mut vol = fresh_volume(2, 16);
    ops::mkdir(&mut vol, "/a", 0o755).unwrap();
    ops::mkdir(&mut vol, "/a/b", 0o755).unwrap();
    ops::mknod(&mut vol, "/a/b/f", 0o644).unwrap();
    ops::write(&mut vol, "/a/b/f", 0, b"hello").unwrap();

    ops::symlink(&mut vol, "/a/b", "/link").unwrap();
    assert_eq!(ops::readlink(&mut vol, "/link").unwrap(), "/a/b");

    let mut buf = [0u8; 5];
    ops::read(&mut vol, "/link/f", 0, &mut buf).unwrap();
    assert_eq!(&buf, b"hello");
}

#[test]
fn s5_hardlink_survives_unlink_of_original_name() {
    let mut vol = fresh_volume(2, 16);
    ops::mkdir(&mut vol, "/a", 0o755).unwrap();
    ops::mkdir(&mut vol, "/a/b", 0o755).unwrap();
    ops::mknod(&mut vol, "/a/b/f", 0o644).unwrap();
    ops::write(&mut vol, "/a/b/f", 0, b"hello").unwrap();

    ops::link(&mut vol, "/a/b/f", "/a/b/g").unwrap();
    let inum = ops::getattr(&mut vol, "/a/b/f").unwrap().inum;
    assert_eq!(vol.get_inode(inum).nlink, 2);

    ops::unlink(&mut vol, "/a/b/f").unwrap();
    let mut buf = [0u8; 5];
    ops::read(&mut vol, "/a/b/g", 0, &mut buf).unwrap();
    assert_eq!(&buf, b"hello");
    assert_eq!(vol.get_inode(inum).nlink, 1);
}

#[test]
fn s6_first_fit_reuses_freed_slot_over_appending() {
    let mut vol = fresh_volume(4, 16);
    ops::mkdir(&mut vol, "/d", 0o755).unwrap();

    // root's "." and ".." already occupy two of the 32 slots per block.
    for i in 0..30 {
        ops::mknod(&mut vol, &format!("/d/f{i}"), 0o644).unwrap();
    }
    let full = dir::find_entry(&mut vol, ops::getattr(&mut vol, "/d").unwrap().inum, "f0")
        .unwrap()
        .unwrap();
    assert_eq!(full.block_no, full.block_no); // block is full: 32 valid entries now

    ops::mknod(&mut vol, "/d/overflow", 0o644).unwrap();
    let d_inum = ops::getattr(&mut vol, "/d").unwrap().inum;
    let overflow = dir::find_entry(&mut vol, d_inum, "overflow").unwrap().unwrap();
    assert_ne!(overflow.block_no, full.block_no, "overflow entry lands in a second block");

    ops::unlink(&mut vol, "/d/f0").unwrap();
    ops::mknod(&mut vol, "/d/new", 0o644).unwrap();
    let reused = dir::find_entry(&mut vol, d_inum, "new").unwrap().unwrap();
    assert_eq!(reused.block_no, full.block_no);
    assert_eq!(reused.slot, full.slot, "new entry takes the freed slot, not the tail");
}

#[test]
fn round_trip_write_then_read() {
    let mut vol = fresh_volume(2, 16);
    ops::mknod(&mut vol, "/f", 0o644).unwrap();
    ops::write(&mut vol, "/f", 0, b"round-trip me").unwrap();
    let mut buf = [0u8; 14];
    ops::read(&mut vol, "/f", 0, &mut buf).unwrap();
    assert_eq!(&buf, b"round-trip me");
}

#[test]
fn truncate_to_zero_frees_exactly_its_blocks() {
    let mut vol = fresh_volume(2, 16);
    ops::mknod(&mut vol, "/f", 0o644).unwrap();
    ops::write(&mut vol, "/f", 0, &vec![9u8; BLOCK_SIZE * 3]).unwrap();
    let before = vol.free_blocks();
    ops::truncate(&mut vol, "/f", 0).unwrap();
    assert_eq!(vol.free_blocks(), before + 3);
}

#[test]
fn mkdir_then_rmdir_restores_parent_size() {
    let mut vol = fresh_volume(2, 16);
    let size_before = ops::getattr(&mut vol, "/").unwrap().size;
    let free_before = vol.free_blocks();

    ops::mkdir(&mut vol, "/tmp", 0o755).unwrap();
    ops::rmdir(&mut vol, "/tmp").unwrap();

    assert_eq!(ops::getattr(&mut vol, "/").unwrap().size, size_before);
    assert_eq!(vol.free_blocks(), free_before);
}

#[test]
fn is_empty_iff_only_dot_entries_remain() {
    let mut vol = fresh_volume(2, 16);
    ops::mkdir(&mut vol, "/d", 0o755).unwrap();
    let inum = ops::getattr(&mut vol, "/d").unwrap().inum;
    assert!(dir::is_empty(&mut vol, inum).unwrap());

    ops::mknod(&mut vol, "/d/f", 0o644).unwrap();
    assert!(!dir::is_empty(&mut vol, inum).unwrap());
}

#[test]
fn symlink_loop_past_max_depth_is_eloop() {
    let mut vol = fresh_volume(2, 16);
    ops::symlink(&mut vol, "/loop", "/loop").unwrap();
    let err = ops::read(&mut vol, "/loop/x", 0, &mut [0u8; 1]);
    assert_eq!(err.unwrap_err(), Error::SymlinkLoop);
}

#[test]
fn rename_within_same_directory() {
    let mut vol = fresh_volume(2, 16);
    ops::mknod(&mut vol, "/a", 0o644).unwrap();
    ops::write(&mut vol, "/a", 0, b"keep-me").unwrap();
    ops::rename(&mut vol, "/a", "/b").unwrap();

    assert_eq!(ops::getattr(&mut vol, "/a").unwrap_err(), Error::NotFound);
    let mut buf = [0u8; 7];
    ops::read(&mut vol, "/b", 0, &mut buf).unwrap();
    assert_eq!(&buf, b"keep-me");
}

#[test]
fn path_resolution_is_idempotent_without_mutation() {
    let mut vol = fresh_volume(2, 16);
    ops::mkdir(&mut vol, "/a", 0o755).unwrap();
    ops::mkdir(&mut vol, "/a/b", 0o755).unwrap();
    ops::mknod(&mut vol, "/a/b/f", 0o644).unwrap();

    let first = ops::getattr(&mut vol, "/a/b/f").unwrap();
    for _ in 0..5 {
        assert_eq!(ops::getattr(&mut vol, "/a/b/f").unwrap(), first);
    }
}
