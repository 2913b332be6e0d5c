/*!
 * Descriptor Tables
 *
 * Per-process fixed-size array of optional shared open files. Slot changes
 * happen under the table spinlock; releasing a displaced file (which may
 * sleep on the file lock) always happens after that spinlock is dropped.
 */

use super::openfile::OpenFile;
use crate::core::errors::Errno;
use crate::core::sync::Spinlock;
use crate::core::types::{Fd, SysResult};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

pub struct FileTable {
    slots: Spinlock<Vec<Option<Arc<OpenFile>>>>,
}

impl FileTable {
    pub fn new(open_max: usize) -> Self {
        Self {
            slots: Spinlock::new("fd table", vec![None; open_max]),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.lock().len()
    }

    fn index(&self, fd: Fd, len: usize) -> SysResult<usize> {
        usize::try_from(fd)
            .ok()
            .filter(|&i| i < len)
            .ok_or(Errno::BadF)
    }

    /// The file at `fd`; EBADF when out of range or empty
    pub fn get(&self, fd: Fd) -> SysResult<Arc<OpenFile>> {
        let slots = self.slots.lock();
        let idx = self.index(fd, slots.len())?;
        slots[idx].clone().ok_or(Errno::BadF)
    }

    pub fn is_open(&self, fd: Fd) -> bool {
        self.get(fd).is_ok()
    }

    /// Number of occupied slots
    pub fn open_count(&self) -> usize {
        self.slots.lock().iter().filter(|s| s.is_some()).count()
    }

    /// Install a file holding a fresh reference in the lowest free slot
    pub fn install(&self, file: Arc<OpenFile>) -> SysResult<Fd> {
        let mut slots = self.slots.lock();
        let idx = slots.iter().position(Option::is_none).ok_or(Errno::MFile)?;
        slots[idx] = Some(file);
        Ok(idx as Fd)
    }

    /// Put `file` at `fd`, returning whatever was displaced
    pub(crate) fn install_at(&self, fd: Fd, file: Arc<OpenFile>) -> SysResult<Option<Arc<OpenFile>>> {
        let mut slots = self.slots.lock();
        let idx = self.index(fd, slots.len())?;
        Ok(slots[idx].replace(file))
    }

    /// Close `fd`: clear the slot, then drop its reference
    pub fn close(&self, fd: Fd) -> SysResult<()> {
        let file = {
            let mut slots = self.slots.lock();
            let idx = self.index(fd, slots.len())?;
            slots[idx].take().ok_or(Errno::BadF)?
        };
        trace!(fd, file = %file.name(), "close");
        file.decref()?;
        Ok(())
    }

    /// Make `newfd` share the file at `oldfd`, implicitly closing what
    /// `newfd` held before. Returns `newfd`.
    pub fn dup2(&self, oldfd: Fd, newfd: Fd) -> SysResult<Fd> {
        let file = {
            let slots = self.slots.lock();
            let old = self.index(oldfd, slots.len())?;
            self.index(newfd, slots.len())?;
            let file = slots[old].clone().ok_or(Errno::BadF)?;
            if oldfd == newfd {
                return Ok(newfd);
            }
            file
        };

        // a racing close may release the file before we share it
        file.try_incref()?;

        let displaced = {
            let mut slots = self.slots.lock();
            let old = oldfd as usize;
            let still_there = matches!(&slots[old], Some(f) if Arc::ptr_eq(f, &file));
            if !still_there {
                drop(slots);
                file.decref()?;
                return Err(Errno::BadF);
            }
            slots[newfd as usize].replace(Arc::clone(&file))
        };

        if let Some(prev) = displaced {
            trace!(fd = newfd, file = %prev.name(), "dup2 displaced");
            prev.decref()?;
        }
        debug!(oldfd, newfd, file = %file.name(), "dup2");
        Ok(newfd)
    }

    /// Share every open slot of `parent` into the same slot here
    pub fn inherit_from(&self, parent: &FileTable) {
        let snapshot: Vec<Option<Arc<OpenFile>>> = parent.slots.lock().clone();
        let shared: Vec<Option<Arc<OpenFile>>> = snapshot
            .into_iter()
            .map(|slot| slot.filter(|file| file.try_incref().is_ok()))
            .collect();
        let mut slots = self.slots.lock();
        for (slot, file) in slots.iter_mut().zip(shared) {
            *slot = file;
        }
    }

    /// Close every descriptor, stopping at the first failure
    pub fn close_all(&self) -> SysResult<()> {
        let files: Vec<(usize, Arc<OpenFile>)> = {
            let mut slots = self.slots.lock();
            slots
                .iter_mut()
                .enumerate()
                .filter_map(|(i, s)| s.take().map(|f| (i, f)))
                .collect()
        };
        for (fd, file) in files {
            trace!(fd, file = %file.name(), "close on exit");
            file.decref()?;
        }
        Ok(())
    }
}

impl fmt::Debug for FileTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.lock();
        f.debug_map()
            .entries(
                slots
                    .iter()
                    .enumerate()
                    .filter_map(|(i, s)| s.as_ref().map(|file| (i, file.name().to_string()))),
            )
            .finish()
    }
}
