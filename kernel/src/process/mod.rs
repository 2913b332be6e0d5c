/*!
 * Process Management
 *
 * Process records and the pid-keyed process table. A process owns its
 * address space, its descriptor table and its exit status; parent and child
 * links are pids resolved through the table.
 */

pub mod table;
pub mod types;

pub use table::ProcessTable;
pub use types::{ExitStatus, ProcessState};

use crate::core::config::ExitNotification;
use crate::core::sync::Spinlock;
use crate::core::types::Pid;
use crate::file::FileTable;
use crate::mm::AddrSpace;
use std::fmt;

/// A process
pub struct Process {
    pid: Pid,
    name: String,
    parent: Spinlock<Option<Pid>>,
    children: Spinlock<Vec<Pid>>,
    addrspace: Spinlock<Option<AddrSpace>>,
    files: FileTable,
    cwd: Spinlock<String>,
    state: Spinlock<ProcessState>,
    exit: ExitStatus,
}

impl Process {
    pub(crate) fn new(pid: Pid, name: &str, open_max: usize, notification: ExitNotification) -> Self {
        Self {
            pid,
            name: name.to_string(),
            parent: Spinlock::new("proc parent", None),
            children: Spinlock::new("proc children", Vec::new()),
            addrspace: Spinlock::new("proc addrspace", None),
            files: FileTable::new(open_max),
            cwd: Spinlock::new("proc cwd", "/".to_string()),
            state: Spinlock::new("proc state", ProcessState::Running),
            exit: ExitStatus::new(name, notification),
        }
    }

    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<Pid> {
        *self.parent.lock()
    }

    pub fn children(&self) -> Vec<Pid> {
        self.children.lock().clone()
    }

    pub fn state(&self) -> ProcessState {
        *self.state.lock()
    }

    /// Address space slot; `None` for the kernel process
    pub fn addrspace(&self) -> &Spinlock<Option<AddrSpace>> {
        &self.addrspace
    }

    /// Swap in a new address space, returning the old one
    pub fn replace_addrspace(&self, space: Option<AddrSpace>) -> Option<AddrSpace> {
        std::mem::replace(&mut *self.addrspace.lock(), space)
    }

    pub fn files(&self) -> &FileTable {
        &self.files
    }

    pub fn cwd(&self) -> String {
        self.cwd.lock().clone()
    }

    pub fn set_cwd(&self, cwd: String) {
        *self.cwd.lock() = cwd;
    }

    pub fn exit_status(&self) -> &ExitStatus {
        &self.exit
    }

    pub fn has_exited(&self) -> bool {
        self.exit.has_exited()
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .field("parent", &self.parent())
            .field("children", &self.children())
            .field("state", &self.state())
            .finish()
    }
}
