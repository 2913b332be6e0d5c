/*!
 * Virtual File System Module
 * Filesystem collaborator used by the open-file layer
 */

pub mod console;
pub mod memory;
pub mod mount;
pub mod traits;
pub mod types;

// Re-exports
pub use console::{BufferConsole, Console, StdioConsole};
pub use memory::MemFs;
pub use mount::Vfs;
pub use traits::{Device, FileSystem, Vnode, VnodeRef};
pub use types::{FileType, OpenFlags, Stat, VfsError, VfsResult};

#[cfg(test)]
pub use traits::MockVnode;
