//! fsx600: an in-memory-mirrored on-disk filesystem core.
//!
//! A mounted [`Volume`] owns a [`BlockDevice`] plus every in-memory mirror
//! of its metadata (superblock, inode/block bitmaps, inode region) and a
//! dirty-block cache for write-back. Every mutation goes through
//! [`ops`], the POSIX-shaped surface (`mkdir`, `unlink`, `rename`, ...)
//! built from the lower-level Bitmap Allocator, Inode Block Map,
//! Directory Engine, Path Resolver, and File I/O modules.
//!
//! ```no_run
//! use fsx600::device::MemDevice;
//! use fsx600::{ops, Volume};
//!
//! # fn main() -> fsx600::Result<()> {
//! let dev = MemDevice::new(64);
//! // a real caller would run mkfs against `dev` first.
//! let mut vol = Volume::mount(dev)?;
//! ops::mknod(&mut vol, "/hello.txt", 0o644)?;
//! ops::write(&mut vol, "/hello.txt", 0, b"hi")?;
//! # Ok(())
//! # }
//! ```

pub mod bitmap;
pub mod blockmap;
pub mod clock;
pub mod device;
pub mod dir;
pub mod dirty;
pub mod error;
pub mod file_ops;
pub mod layout;
pub mod ops;
pub mod path;
pub mod volume;

pub use device::BlockDevice;
pub use error::{Error, Result};
pub use file_ops::Stat;
pub use layout::{Dirent, Inode, Superblock, BLOCK_SIZE};
pub use ops::Statfs;
pub use volume::Volume;
