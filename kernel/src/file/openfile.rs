/*!
 * Open Files
 *
 * An `OpenFile` is the object a descriptor names: a vnode, an access mode,
 * the current offset and a reference count, with one per-file `Lock`
 * serializing offset updates across every descriptor that shares it.
 * Descriptor references are counted explicitly and only under that lock;
 * when the count drops to zero the vnode is closed and the pool slot freed.
 */

use crate::core::errors::Errno;
use crate::core::sync::{Lock, Spinlock};
use crate::core::types::{AccessMode, Off, SysResult, Whence};
use crate::kassert;
use crate::vfs::{Stat, VnodeRef};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug)]
struct PoolState {
    used: Vec<bool>,
    in_use: usize,
    hint: usize,
}

/// System-wide table of open-file slots
#[derive(Debug)]
pub struct OpenFilePool {
    state: Spinlock<PoolState>,
}

impl OpenFilePool {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            state: Spinlock::new(
                "open file pool",
                PoolState {
                    used: vec![false; capacity],
                    in_use: 0,
                    hint: 0,
                },
            ),
        })
    }

    /// Claim a free slot, ENFILE when every slot is taken
    fn alloc(&self) -> SysResult<usize> {
        let mut state = self.state.lock();
        let capacity = state.used.len();
        if state.in_use == capacity {
            return Err(Errno::NFile);
        }
        let start = state.hint;
        for i in 0..capacity {
            let idx = (start + i) % capacity;
            if !state.used[idx] {
                state.used[idx] = true;
                state.in_use += 1;
                state.hint = (idx + 1) % capacity;
                return Ok(idx);
            }
        }
        Err(Errno::NFile)
    }

    fn free(&self, idx: usize) {
        let mut state = self.state.lock();
        kassert!(state.used[idx], "open file pool: slot {} freed twice", idx);
        state.used[idx] = false;
        state.in_use -= 1;
    }

    pub fn in_use(&self) -> usize {
        self.state.lock().in_use
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().used.len()
    }
}

#[derive(Debug)]
struct FileState {
    offset: Off,
    refcount: usize,
}

/// Shared open-file object
pub struct OpenFile {
    name: String,
    vnode: VnodeRef,
    access: AccessMode,
    state: Lock<FileState>,
    pool: Arc<OpenFilePool>,
    slot: usize,
}

impl OpenFile {
    /// Wrap `vnode` in a new open file holding one reference.
    ///
    /// On failure the vnode is closed and no pool slot stays claimed.
    pub fn open(
        pool: &Arc<OpenFilePool>,
        vnode: VnodeRef,
        access: AccessMode,
        append: bool,
        name: impl Into<String>,
    ) -> SysResult<Arc<OpenFile>> {
        let name = name.into();
        let slot = match pool.alloc() {
            Ok(slot) => slot,
            Err(e) => {
                warn!(file = %name, "system open file table full");
                let _ = vnode.close();
                return Err(e);
            }
        };

        let offset = if append {
            match vnode.stat() {
                Ok(stat) => stat.size as Off,
                Err(e) => {
                    pool.free(slot);
                    let _ = vnode.close();
                    return Err(e.into());
                }
            }
        } else {
            0
        };

        debug!(file = %name, slot, ?access, offset, "open file created");
        Ok(Arc::new(OpenFile {
            state: Lock::new(name.clone(), FileState { offset, refcount: 1 }),
            name,
            vnode,
            access,
            pool: Arc::clone(pool),
            slot,
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn access(&self) -> AccessMode {
        self.access
    }

    pub fn vnode(&self) -> &VnodeRef {
        &self.vnode
    }

    pub fn refcount(&self) -> usize {
        self.state.acquire().refcount
    }

    pub fn offset(&self) -> Off {
        self.state.acquire().offset
    }

    /// Add a descriptor reference. The caller must already hold one.
    pub fn incref(&self) {
        let mut state = self.state.acquire();
        kassert!(
            state.refcount > 0,
            "file {}: incref of a released file",
            self.name
        );
        state.refcount += 1;
    }

    /// Add a reference unless the file was already released; EBADF then.
    ///
    /// For callers that found the file through a table slot and dropped the
    /// table lock before taking their reference.
    pub fn try_incref(&self) -> SysResult<()> {
        let mut state = self.state.acquire();
        if state.refcount == 0 {
            return Err(Errno::BadF);
        }
        state.refcount += 1;
        Ok(())
    }

    /// Drop a descriptor reference, releasing the file at zero.
    ///
    /// Returns whether this was the last reference.
    pub fn decref(&self) -> SysResult<bool> {
        let mut state = self.state.acquire();
        kassert!(
            state.refcount > 0,
            "file {}: reference count underflow",
            self.name
        );
        state.refcount -= 1;
        if state.refcount > 0 {
            return Ok(false);
        }
        drop(state);

        self.pool.free(self.slot);
        debug!(file = %self.name, slot = self.slot, "open file released");
        self.vnode.close()?;
        Ok(true)
    }

    /// Read up to `len` bytes at the current offset, handing them to `sink`
    /// before the offset advances. EBADF if the file is not readable.
    pub fn read_with(
        &self,
        len: usize,
        sink: impl FnOnce(&[u8]) -> SysResult<()>,
    ) -> SysResult<usize> {
        let mut state = self.state.acquire();
        if !self.access.can_read() {
            return Err(Errno::BadF);
        }
        let mut buf = vec![0u8; len];
        let n = self.vnode.read_at(state.offset as u64, &mut buf)?;
        sink(&buf[..n])?;
        state.offset += n as Off;
        Ok(n)
    }

    pub fn read(&self, buf: &mut [u8]) -> SysResult<usize> {
        let len = buf.len();
        self.read_with(len, |bytes| {
            buf[..bytes.len()].copy_from_slice(bytes);
            Ok(())
        })
    }

    /// Write `data` at the current offset. EBADF if the file is not writable.
    pub fn write(&self, data: &[u8]) -> SysResult<usize> {
        let mut state = self.state.acquire();
        if !self.access.can_write() {
            return Err(Errno::BadF);
        }
        let n = self.vnode.write_at(state.offset as u64, data)?;
        state.offset += n as Off;
        Ok(n)
    }

    /// Reposition the offset; a negative result is EINVAL
    pub fn seek(&self, offset: Off, whence: Whence) -> SysResult<Off> {
        let mut state = self.state.acquire();
        if !self.vnode.is_seekable() {
            return Err(Errno::SPipe);
        }
        let base = match whence {
            Whence::Set => 0,
            Whence::Cur => state.offset,
            Whence::End => self.vnode.stat()?.size as Off,
        };
        let target = base.checked_add(offset).ok_or(Errno::Inval)?;
        if target < 0 {
            return Err(Errno::Inval);
        }
        state.offset = target;
        Ok(target)
    }

    pub fn stat(&self) -> SysResult<Stat> {
        Ok(self.vnode.stat()?)
    }
}

impl fmt::Debug for OpenFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenFile")
            .field("name", &self.name)
            .field("access", &self.access)
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}
