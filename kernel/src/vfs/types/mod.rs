/*!
 * VFS Types
 * Shared types for filesystem operations
 */

mod errors;
mod open_flags;
mod stat;

pub use errors::{VfsError, VfsResult};
pub use open_flags::OpenFlags;
pub use stat::{FileType, Stat};
