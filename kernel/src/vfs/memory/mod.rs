/*!
 * In-Memory Filesystem Backend
 * Volatile tree of files and directories used as the root filesystem
 */

mod node;
mod vnode;

use ahash::RandomState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::debug;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use super::traits::{FileSystem, VnodeRef};
use super::types::*;
use node::Node;
pub use vnode::MemVnode;

/// Byte accounting shared by a filesystem and its open vnodes
#[derive(Debug, Clone)]
pub(super) struct SpaceAccount {
    max_size: Option<usize>,
    current_size: Arc<AtomicUsize>,
}

impl SpaceAccount {
    /// Reserve `additional` bytes, failing if the limit would be crossed
    pub(super) fn reserve(&self, additional: usize) -> VfsResult<()> {
        if let Some(max) = self.max_size {
            let mut current = self.current_size.load(Ordering::SeqCst);
            loop {
                if current + additional > max {
                    return Err(VfsError::OutOfSpace);
                }
                match self.current_size.compare_exchange(
                    current,
                    current + additional,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                ) {
                    Ok(_) => return Ok(()),
                    Err(actual) => current = actual,
                }
            }
        }
        self.current_size.fetch_add(additional, Ordering::SeqCst);
        Ok(())
    }

    pub(super) fn release(&self, amount: usize) {
        self.current_size.fetch_sub(amount, Ordering::SeqCst);
    }

    fn used(&self) -> usize {
        self.current_size.load(Ordering::SeqCst)
    }
}

/// In-memory filesystem implementation
#[derive(Debug, Clone)]
pub struct MemFs {
    nodes: Arc<DashMap<PathBuf, Node, RandomState>>,
    space: SpaceAccount,
    next_ino: Arc<AtomicU64>,
}

impl Default for MemFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemFs {
    /// Create new in-memory filesystem holding only `/`
    pub fn new() -> Self {
        let nodes = DashMap::with_hasher(RandomState::new());
        nodes.insert(
            PathBuf::from("/"),
            Node::Directory {
                children: BTreeSet::new(),
                ino: 1,
                mode: 0o755,
            },
        );

        Self {
            nodes: Arc::new(nodes),
            space: SpaceAccount {
                max_size: None,
                current_size: Arc::new(AtomicUsize::new(0)),
            },
            next_ino: Arc::new(AtomicU64::new(2)),
        }
    }

    /// Create with a limit on total file bytes
    pub fn with_capacity(max_size: usize) -> Self {
        let mut fs = Self::new();
        fs.space.max_size = Some(max_size);
        fs
    }

    /// Bytes held by regular files
    pub fn used_bytes(&self) -> usize {
        self.space.used()
    }

    /// Normalize path (make absolute and clean)
    pub(super) fn normalize(path: &Path) -> PathBuf {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new("/").join(path)
        };
        PathBuf::from(path_clean::clean(&path))
    }

    fn alloc_ino(&self) -> u64 {
        self.next_ino.fetch_add(1, Ordering::Relaxed)
    }

    /// Split into parent and final component, checking the parent is a directory
    fn check_parent(&self, path: &Path) -> VfsResult<(PathBuf, String)> {
        let parent = path
            .parent()
            .ok_or_else(|| VfsError::InvalidPath(path.display().to_string()))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| VfsError::InvalidPath(path.display().to_string()))?
            .to_string();
        match self.nodes.get(parent) {
            Some(node) if node.is_dir() => Ok((parent.to_path_buf(), name)),
            Some(_) => Err(VfsError::NotADirectory(parent.display().to_string())),
            None => Err(VfsError::NotFound(parent.display().to_string())),
        }
    }

    fn link_child(&self, parent: &Path, name: String) {
        if let Some(mut node) = self.nodes.get_mut(parent) {
            if let Node::Directory { children, .. } = node.value_mut() {
                children.insert(name);
            }
        }
    }

    /// Create or replace a regular file with `data`
    pub fn create_file(&self, path: impl AsRef<Path>, data: &[u8]) -> VfsResult<()> {
        let path = Self::normalize(path.as_ref());
        let (parent, name) = self.check_parent(&path)?;
        self.space.reserve(data.len())?;

        let replaced = match self.nodes.entry(path.clone()) {
            Entry::Occupied(slot) => match slot.get() {
                Node::Directory { .. } => {
                    self.space.release(data.len());
                    return Err(VfsError::IsADirectory(path.display().to_string()));
                }
                Node::File { data: old, .. } => {
                    let mut old = old.write();
                    let released = old.len();
                    *old = data.to_vec();
                    Some(released)
                }
            },
            Entry::Vacant(slot) => {
                slot.insert(Node::File {
                    data: Arc::new(RwLock::new(data.to_vec())),
                    ino: self.alloc_ino(),
                    mode: 0o644,
                });
                None
            }
        };
        match replaced {
            Some(released) => self.space.release(released),
            None => self.link_child(&parent, name),
        }
        debug!("memfs: wrote {} ({} bytes)", path.display(), data.len());
        Ok(())
    }

    /// Read a whole regular file
    pub fn read_file(&self, path: impl AsRef<Path>) -> VfsResult<Vec<u8>> {
        let path = Self::normalize(path.as_ref());
        match self.nodes.get(&path).as_deref() {
            Some(Node::File { data, .. }) => Ok(data.read().clone()),
            Some(Node::Directory { .. }) => Err(VfsError::IsADirectory(path.display().to_string())),
            None => Err(VfsError::NotFound(path.display().to_string())),
        }
    }

    /// Create a directory and any missing ancestors
    pub fn create_dir_all(&self, path: impl AsRef<Path>) -> VfsResult<()> {
        let path = Self::normalize(path.as_ref());
        let mut current = PathBuf::from("/");
        for component in path.components().skip(1) {
            current.push(component);
            match self.nodes.get(&current).map(|n| n.is_dir()) {
                Some(true) => continue,
                Some(false) => return Err(VfsError::NotADirectory(current.display().to_string())),
                None => self.mkdir(&current, 0o755)?,
            }
        }
        Ok(())
    }

    /// Names directly inside the directory at `path`
    pub fn list_dir(&self, path: impl AsRef<Path>) -> VfsResult<Vec<String>> {
        let path = Self::normalize(path.as_ref());
        match self.nodes.get(&path).as_deref() {
            Some(Node::Directory { children, .. }) => Ok(children.iter().cloned().collect()),
            Some(_) => Err(VfsError::NotADirectory(path.display().to_string())),
            None => Err(VfsError::NotFound(path.display().to_string())),
        }
    }
}

impl FileSystem for MemFs {
    fn open(&self, path: &Path, flags: OpenFlags, mode: u32) -> VfsResult<VnodeRef> {
        let path = Self::normalize(path);

        let existing = self.nodes.get(&path).map(|n| n.value().clone());
        let node = match existing {
            Some(_) if flags.create && flags.exclusive => {
                return Err(VfsError::AlreadyExists(path.display().to_string()));
            }
            Some(node) => node,
            None if !flags.create => {
                return Err(VfsError::NotFound(path.display().to_string()));
            }
            None => {
                let (parent, name) = self.check_parent(&path)?;
                let created = match self.nodes.entry(path.clone()) {
                    Entry::Occupied(slot) if flags.exclusive => {
                        drop(slot);
                        return Err(VfsError::AlreadyExists(path.display().to_string()));
                    }
                    Entry::Occupied(slot) => (slot.get().clone(), false),
                    Entry::Vacant(slot) => {
                        let node = Node::File {
                            data: Arc::new(RwLock::new(Vec::new())),
                            ino: self.alloc_ino(),
                            mode: mode & 0o7777,
                        };
                        slot.insert(node.clone());
                        (node, true)
                    }
                };
                if created.1 {
                    self.link_child(&parent, name);
                    debug!("memfs: created {}", path.display());
                }
                created.0
            }
        };

        match node {
            Node::Directory { ino, mode, .. } => {
                if flags.is_writable() {
                    return Err(VfsError::IsADirectory(path.display().to_string()));
                }
                Ok(Arc::new(MemVnode::directory(path, ino, mode)))
            }
            Node::File { data, ino, mode } => {
                if flags.truncate && flags.is_writable() {
                    let mut bytes = data.write();
                    self.space.release(bytes.len());
                    bytes.clear();
                }
                Ok(Arc::new(MemVnode::file(
                    path,
                    ino,
                    mode,
                    data,
                    self.space.clone(),
                )))
            }
        }
    }

    fn mkdir(&self, path: &Path, mode: u32) -> VfsResult<()> {
        let path = Self::normalize(path);
        let (parent, name) = self.check_parent(&path)?;
        match self.nodes.entry(path.clone()) {
            Entry::Occupied(_) => {
                return Err(VfsError::AlreadyExists(path.display().to_string()));
            }
            Entry::Vacant(slot) => {
                slot.insert(Node::Directory {
                    children: BTreeSet::new(),
                    ino: self.alloc_ino(),
                    mode: mode & 0o7777,
                });
            }
        }
        self.link_child(&parent, name);
        debug!("memfs: mkdir {}", path.display());
        Ok(())
    }

    fn stat(&self, path: &Path) -> VfsResult<Stat> {
        let path = Self::normalize(path);
        self.nodes
            .get(&path)
            .map(|n| n.stat())
            .ok_or_else(|| VfsError::NotFound(path.display().to_string()))
    }

    fn name(&self) -> &str {
        "memfs"
    }
}
