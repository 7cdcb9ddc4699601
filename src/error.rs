//! Error taxonomy surfaced by every core operation.
//!
//! Mirrors the POSIX errno set the original C implementation returned as
//! negative `int`s (`-ENOENT`, `-EIO`, ...). Kept as a plain enum with a
//! hand-written `Display`/`Error` impl rather than pulling in a derive
//! macro crate.

use core::fmt;

/// A core operation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A component of a path is not present.
    NotFound,
    /// An intermediate path component is not a directory.
    NotDir,
    /// Operation requires a non-directory, found a directory.
    IsDir,
    /// Creating an entry that already exists.
    AlreadyExists,
    /// No free block, inode, or directory slot.
    NoSpace,
    /// Bad argument: write past EOF, truncate to a larger size, rename
    /// across directories, `.`/`..` as an operand, and similar.
    InvalidArgument,
    /// `rmdir` on a non-empty directory.
    NotEmpty,
    /// Block device read or write failed.
    Io,
    /// Symlink chain exceeded the maximum expansion depth.
    SymlinkLoop,
    /// Operation not supported by this core.
    NotSupported,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Error::NotFound => "no such file or directory",
            Error::NotDir => "not a directory",
            Error::IsDir => "is a directory",
            Error::AlreadyExists => "file exists",
            Error::NoSpace => "no space left on device",
            Error::InvalidArgument => "invalid argument",
            Error::NotEmpty => "directory not empty",
            Error::Io => "I/O error",
            Error::SymlinkLoop => "too many levels of symbolic links",
            Error::NotSupported => "operation not supported",
        };
        f.write_str(s)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(_: std::io::Error) -> Self {
        Error::Io
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
