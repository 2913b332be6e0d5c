/*!
 * Process Table
 *
 * Pid-keyed arena of live processes. All parent/child link changes and
 * lifecycle transitions happen under the table's family spinlock so that
 * concurrent exits of a parent and its children agree on who reaps whom:
 * - a child that already exited when its parent exits is reaped by the parent
 * - a live child is detached and later reaps itself when it exits
 */

use super::types::ProcessState;
use super::Process;
use crate::core::config::ExitNotification;
use crate::core::errors::Errno;
use crate::core::limits::{KERNEL_PID, PID_MAX, PID_MIN};
use crate::core::sync::{Spinlock, SpinlockGuard};
use crate::core::types::{Pid, SysResult};
use crate::kassert;
use ahash::RandomState;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

#[derive(Debug)]
struct Family {
    next_pid: Pid,
    live: usize,
}

/// Process arena
pub struct ProcessTable {
    procs: DashMap<Pid, Arc<Process>, RandomState>,
    family: Spinlock<Family>,
    max_procs: usize,
}

impl ProcessTable {
    pub fn new(max_procs: usize) -> Self {
        Self {
            procs: DashMap::with_hasher(RandomState::new()),
            family: Spinlock::new(
                "process family",
                Family {
                    next_pid: PID_MIN,
                    live: 0,
                },
            ),
            max_procs,
        }
    }

    /// Register the kernel process. It has no parent and is never counted or reaped.
    pub fn bootstrap_kernel(&self, open_max: usize) -> Arc<Process> {
        let proc = Arc::new(Process::new(
            KERNEL_PID,
            "[kernel]",
            open_max,
            ExitNotification::Condvar,
        ));
        self.procs.insert(KERNEL_PID, Arc::clone(&proc));
        info!(pid = KERNEL_PID, "kernel process created");
        proc
    }

    pub fn get(&self, pid: Pid) -> Option<Arc<Process>> {
        self.procs.get(&pid).map(|p| Arc::clone(p.value()))
    }

    /// User processes not yet reaped
    pub fn live_count(&self) -> usize {
        self.family.lock().live
    }

    pub fn max_procs(&self) -> usize {
        self.max_procs
    }

    pub fn pids(&self) -> Vec<Pid> {
        let mut pids: Vec<Pid> = self.procs.iter().map(|e| *e.key()).collect();
        pids.sort_unstable();
        pids
    }

    /// Create a process with a fresh pid as a child of `parent`.
    ///
    /// ENPROC when the live count is at the cap or no pid is free.
    pub fn alloc_child(
        &self,
        parent: &Process,
        name: &str,
        open_max: usize,
        notification: ExitNotification,
    ) -> SysResult<Arc<Process>> {
        let mut family = self.family.lock();
        if family.live >= self.max_procs {
            warn!(live = family.live, max = self.max_procs, "process table full");
            return Err(Errno::NProc);
        }
        let pid = self.next_free_pid(&mut family).ok_or(Errno::NProc)?;

        let proc = Arc::new(Process::new(pid, name, open_max, notification));
        *proc.parent.lock() = Some(parent.pid());
        parent.children.lock().push(pid);
        self.procs.insert(pid, Arc::clone(&proc));
        family.live += 1;
        debug!(pid, parent = parent.pid(), name, "process allocated");
        Ok(proc)
    }

    fn next_free_pid(&self, family: &mut SpinlockGuard<'_, Family>) -> Option<Pid> {
        let span = (PID_MAX - PID_MIN + 1) as usize;
        let mut candidate = family.next_pid;
        for _ in 0..span {
            let next = if candidate >= PID_MAX { PID_MIN } else { candidate + 1 };
            if !self.procs.contains_key(&candidate) {
                family.next_pid = next;
                return Some(candidate);
            }
            candidate = next;
        }
        None
    }

    /// Undo `alloc_child` for a child that never ran
    pub fn discard(&self, child: &Process) {
        let mut family = self.family.lock();
        self.remove_locked(&mut family, child);
        debug!(pid = child.pid(), "process discarded");
    }

    /// Check that `caller` may wait for `pid` and return the target.
    ///
    /// ESRCH for out-of-range or unknown pids; EPERM for self, own parent
    /// and siblings; ECHILD for anything else that is not a child.
    pub fn waitable_child(&self, caller: &Process, pid: Pid) -> SysResult<Arc<Process>> {
        if pid <= 0 || pid > PID_MAX {
            return Err(Errno::Srch);
        }
        let _family = self.family.lock();
        let target = self.get(pid).ok_or(Errno::Srch)?;
        if pid == caller.pid() {
            return Err(Errno::Perm);
        }
        let caller_parent = caller.parent();
        if caller_parent == Some(pid) {
            return Err(Errno::Perm);
        }
        let target_parent = target.parent();
        if target_parent == Some(caller.pid()) {
            return Ok(target);
        }
        if caller_parent.is_some() && target_parent == caller_parent {
            return Err(Errno::Perm);
        }
        Err(Errno::Child)
    }

    /// Family bookkeeping for an exiting process whose status is published.
    ///
    /// Reaps exited children, detaches live ones, marks `proc` a zombie and
    /// reaps it too if nobody is left to wait for it.
    pub fn exit(&self, proc: &Process) {
        let mut family = self.family.lock();
        let children = std::mem::take(&mut *proc.children.lock());
        for pid in children {
            let Some(child) = self.get(pid) else { continue };
            if child.state() == ProcessState::Zombie {
                trace!(parent = proc.pid(), pid, "reaping exited orphan");
                self.remove_locked(&mut family, &child);
            } else {
                trace!(parent = proc.pid(), pid, "detaching live child");
                *child.parent.lock() = None;
            }
        }

        if proc.state() == ProcessState::Reaped {
            return;
        }
        *proc.state.lock() = ProcessState::Zombie;
        if proc.parent().is_none() {
            debug!(pid = proc.pid(), "detached process reaps itself");
            self.remove_locked(&mut family, proc);
        }
    }

    /// Remove an exited child after its parent collected the status
    pub fn reap(&self, child: &Process) {
        let mut family = self.family.lock();
        self.remove_locked(&mut family, child);
        debug!(pid = child.pid(), "process reaped");
    }

    fn remove_locked(&self, family: &mut SpinlockGuard<'_, Family>, proc: &Process) {
        let mut state = proc.state.lock();
        if *state == ProcessState::Reaped {
            return;
        }
        *state = ProcessState::Reaped;
        drop(state);

        if let Some(parent) = proc.parent().and_then(|ppid| self.get(ppid)) {
            parent.children.lock().retain(|&c| c != proc.pid());
        }
        *proc.parent.lock() = None;
        if self.procs.remove(&proc.pid()).is_some() {
            kassert!(family.live > 0, "process table live count underflow");
            family.live -= 1;
        }
    }
}
