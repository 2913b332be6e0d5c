/*!
 * MemFs Vnodes
 */

use log::trace;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;

use super::super::traits::Vnode;
use super::super::types::*;
use super::SpaceAccount;

#[derive(Debug)]
enum Contents {
    File {
        data: Arc<RwLock<Vec<u8>>>,
        space: SpaceAccount,
    },
    Directory,
}

/// Open handle on a MemFs node
#[derive(Debug)]
pub struct MemVnode {
    path: PathBuf,
    ino: u64,
    mode: u32,
    contents: Contents,
}

impl MemVnode {
    pub(super) fn file(
        path: PathBuf,
        ino: u64,
        mode: u32,
        data: Arc<RwLock<Vec<u8>>>,
        space: SpaceAccount,
    ) -> Self {
        Self {
            path,
            ino,
            mode,
            contents: Contents::File { data, space },
        }
    }

    pub(super) fn directory(path: PathBuf, ino: u64, mode: u32) -> Self {
        Self {
            path,
            ino,
            mode,
            contents: Contents::Directory,
        }
    }

    fn is_a_directory(&self) -> VfsError {
        VfsError::IsADirectory(self.path.display().to_string())
    }
}

impl Vnode for MemVnode {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> VfsResult<usize> {
        let Contents::File { data, .. } = &self.contents else {
            return Err(self.is_a_directory());
        };
        let data = data.read();
        let start = match usize::try_from(offset) {
            Ok(start) if start < data.len() => start,
            _ => return Ok(0),
        };
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    fn write_at(&self, offset: u64, bytes: &[u8]) -> VfsResult<usize> {
        let Contents::File { data, space } = &self.contents else {
            return Err(self.is_a_directory());
        };
        let start = usize::try_from(offset).map_err(|_| VfsError::OutOfSpace)?;
        let end = start.checked_add(bytes.len()).ok_or(VfsError::OutOfSpace)?;

        let mut data = data.write();
        if end > data.len() {
            space.reserve(end - data.len())?;
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(bytes);
        trace!("memfs: {} bytes at {} in {}", bytes.len(), offset, self.path.display());
        Ok(bytes.len())
    }

    fn stat(&self) -> VfsResult<Stat> {
        Ok(match &self.contents {
            Contents::File { data, .. } => Stat {
                ino: self.ino,
                size: data.read().len() as u64,
                file_type: FileType::File,
                mode: self.mode,
                nlink: 1,
            },
            Contents::Directory => Stat {
                ino: self.ino,
                size: 0,
                file_type: FileType::Directory,
                mode: self.mode,
                nlink: 2,
            },
        })
    }

    fn close(&self) -> VfsResult<()> {
        trace!("memfs: close {}", self.path.display());
        Ok(())
    }
}
