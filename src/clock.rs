//! Wall-clock timestamps for inode `ctime`/`mtime`, matching the
//! original's bare `time(NULL)` calls (good through 2106, same as the
//! 32-bit field it's stored in).

use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch, truncated to 32 bits.
pub fn now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}
