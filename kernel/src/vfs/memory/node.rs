/*!
 * Filesystem Node Types
 * Internal representation of files and directories
 */

use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::super::types::{FileType, Stat};

/// In-memory filesystem node
#[derive(Debug, Clone)]
pub(in crate::vfs) enum Node {
    File {
        data: Arc<RwLock<Vec<u8>>>,
        ino: u64,
        mode: u32,
    },
    Directory {
        children: BTreeSet<String>,
        ino: u64,
        mode: u32,
    },
}

impl Node {
    pub fn is_dir(&self) -> bool {
        matches!(self, Node::Directory { .. })
    }

    pub fn file_type(&self) -> FileType {
        match self {
            Node::File { .. } => FileType::File,
            Node::Directory { .. } => FileType::Directory,
        }
    }

    pub fn stat(&self) -> Stat {
        match self {
            Node::File { data, ino, mode } => Stat {
                ino: *ino,
                size: data.read().len() as u64,
                file_type: FileType::File,
                mode: *mode,
                nlink: 1,
            },
            Node::Directory { ino, mode, .. } => Stat {
                ino: *ino,
                size: 0,
                file_type: self.file_type(),
                mode: *mode,
                nlink: 2,
            },
        }
    }
}
