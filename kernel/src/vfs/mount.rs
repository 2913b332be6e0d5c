/*!
 * VFS Router
 *
 * Routes `name:` paths to registered devices and everything else to the
 * root filesystem. Relative paths are resolved against a caller-supplied
 * working directory and cleaned before the filesystem sees them.
 */

use ahash::RandomState;
use dashmap::DashMap;
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::console::{Console, ConsoleDevice};
use super::traits::{Device, FileSystem, VnodeRef};
use super::types::*;

/// Devices plus root filesystem
pub struct Vfs {
    root: Arc<dyn FileSystem>,
    devices: DashMap<String, Arc<dyn Device>, RandomState>,
    console: Arc<dyn Console>,
}

impl Vfs {
    /// Router over `root` with `console` registered as `con:`
    pub fn new(root: Arc<dyn FileSystem>, console: Arc<dyn Console>) -> Self {
        let vfs = Self {
            root,
            devices: DashMap::with_hasher(RandomState::new()),
            console,
        };
        let con: Arc<dyn Device> = Arc::new(ConsoleDevice::new(Arc::clone(&vfs.console)));
        vfs.devices.insert(con.name().to_string(), con);
        info!("vfs: root {} with console device", vfs.root.name());
        vfs
    }

    /// Register another device under `name:`
    pub fn add_device(&self, device: Arc<dyn Device>) -> VfsResult<()> {
        let name = device.name().to_string();
        if self.devices.contains_key(&name) {
            return Err(VfsError::AlreadyExists(format!("device {}:", name)));
        }
        debug!("vfs: registered device {}:", name);
        self.devices.insert(name, device);
        Ok(())
    }

    pub fn console(&self) -> &Arc<dyn Console> {
        &self.console
    }

    pub fn root(&self) -> &Arc<dyn FileSystem> {
        &self.root
    }

    /// Absolute, cleaned form of `path` seen from `cwd`
    pub fn resolve(cwd: &str, path: &str) -> PathBuf {
        let joined = if path.starts_with('/') {
            PathBuf::from(path)
        } else {
            Path::new(cwd).join(path)
        };
        PathBuf::from(path_clean::clean(&joined))
    }

    fn split_device(path: &str) -> Option<(&str, &str)> {
        let idx = path.find(':')?;
        Some((&path[..idx], &path[idx + 1..]))
    }

    fn device(&self, name: &str, rest: &str) -> VfsResult<Arc<dyn Device>> {
        if !rest.is_empty() {
            return Err(VfsError::NotADirectory(format!("{}:{}", name, rest)));
        }
        self.devices
            .get(name)
            .map(|d| Arc::clone(d.value()))
            .ok_or_else(|| VfsError::NotFound(format!("{}:", name)))
    }

    pub fn open(&self, cwd: &str, path: &str, flags: OpenFlags, mode: u32) -> VfsResult<VnodeRef> {
        if path.is_empty() {
            return Err(VfsError::InvalidPath("empty path".to_string()));
        }
        if let Some((name, rest)) = Self::split_device(path) {
            return self.device(name, rest)?.open(flags);
        }
        let resolved = Self::resolve(cwd, path);
        if flags.is_writable() && self.root.readonly() {
            return Err(VfsError::ReadOnly);
        }
        debug!("vfs: open {} ({:?})", resolved.display(), flags.access);
        self.root.open(&resolved, flags, mode)
    }

    pub fn mkdir(&self, cwd: &str, path: &str, mode: u32) -> VfsResult<()> {
        if path.is_empty() {
            return Err(VfsError::InvalidPath("empty path".to_string()));
        }
        if Self::split_device(path).is_some() {
            return Err(VfsError::NotSupported(format!("mkdir on device {}", path)));
        }
        if self.root.readonly() {
            return Err(VfsError::ReadOnly);
        }
        self.root.mkdir(&Self::resolve(cwd, path), mode)
    }

    pub fn stat(&self, cwd: &str, path: &str) -> VfsResult<Stat> {
        if path.is_empty() {
            return Err(VfsError::InvalidPath("empty path".to_string()));
        }
        if let Some((name, rest)) = Self::split_device(path) {
            return self.device(name, rest)?.open(OpenFlags::read_only())?.stat();
        }
        self.root.stat(&Self::resolve(cwd, path))
    }
}
