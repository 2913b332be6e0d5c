/*!
 * VFS Traits
 * Filesystem and vnode abstractions consumed by the open-file layer
 */

use std::path::Path;
use std::sync::Arc;

use super::types::*;

/// An open filesystem object.
///
/// Offsets are owned by the caller; a vnode only does positioned I/O.
#[cfg_attr(test, mockall::automock)]
pub trait Vnode: Send + Sync {
    /// Read into `buf` starting at `offset`; returns bytes read (0 at end)
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> VfsResult<usize>;

    /// Write `data` at `offset`; returns bytes written
    fn write_at(&self, offset: u64, data: &[u8]) -> VfsResult<usize>;

    fn stat(&self) -> VfsResult<Stat>;

    /// Whether offsets are meaningful for this object
    fn is_seekable(&self) -> bool {
        true
    }

    /// Called once, when the last open-file reference goes away
    fn close(&self) -> VfsResult<()>;
}

/// Shared vnode handle
pub type VnodeRef = Arc<dyn Vnode>;

/// Virtual filesystem trait
///
/// Paths handed to a filesystem are absolute and already cleaned.
pub trait FileSystem: Send + Sync {
    /// Look up (and per `flags` create or truncate) the object at `path`
    fn open(&self, path: &Path, flags: OpenFlags, mode: u32) -> VfsResult<VnodeRef>;

    /// Create a directory; the parent must exist
    fn mkdir(&self, path: &Path, mode: u32) -> VfsResult<()>;

    fn stat(&self, path: &Path) -> VfsResult<Stat>;

    /// Get filesystem name/type
    fn name(&self) -> &str;

    fn readonly(&self) -> bool {
        false
    }
}

/// A named character device reachable as `name:`
pub trait Device: Send + Sync {
    fn open(&self, flags: OpenFlags) -> VfsResult<VnodeRef>;

    fn name(&self) -> &str;
}
