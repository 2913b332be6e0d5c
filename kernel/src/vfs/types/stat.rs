/*!
 * File Status
 */

use super::errors::{VfsError, VfsResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileType {
    File,
    Directory,
    Device,
}

/// Status record returned by fstat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    pub ino: u64,
    pub size: u64,
    pub file_type: FileType,
    pub mode: u32,
    pub nlink: u32,
}

impl Stat {
    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }

    /// Wire form copied out to user buffers
    pub fn encode(&self) -> VfsResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| VfsError::IoError(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> VfsResult<Self> {
        bincode::deserialize(bytes).map_err(|e| VfsError::InvalidArgument(e.to_string()))
    }

    /// Size of the wire form
    pub fn encoded_len() -> usize {
        // ino, size, file_type tag, mode, nlink
        8 + 8 + 4 + 4 + 4
    }
}
