/*!
 * Process Syscalls
 * fork, execv, _exit, waitpid and getpid
 */

use super::callno::*;
use super::exec::sys_execv;
use super::handler::SyscallHandler;
use super::{arg_i32, arg_ptr, curproc};
use crate::core::errors::Errno;
use crate::core::limits::WNOHANG;
use crate::core::types::{Pid, SysResult, UserPtr};
use crate::kernel::Kernel;
use crate::machine::{enter_forked_process, TrapFrame};
use crate::mm::copyout_u32;
use crate::{kpanic, thread};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Handler for process lifecycle syscalls
pub struct ProcessHandler;

impl SyscallHandler for ProcessHandler {
    fn handle(&self, kernel: &Kernel, tf: &TrapFrame) -> Option<SysResult<i64>> {
        let result = match tf.v0 {
            SYS_FORK => sys_fork(kernel, tf).map(i64::from),
            SYS_EXECV => sys_execv(kernel, arg_ptr(tf.a0), arg_ptr(tf.a1)).map(|never| match never {}),
            SYS_EXIT => sys_exit(kernel, arg_i32(tf.a0)),
            SYS_WAITPID => sys_waitpid(kernel, arg_i32(tf.a0), arg_ptr(tf.a1), arg_i32(tf.a2))
                .map(i64::from),
            SYS_GETPID => Ok(i64::from(sys_getpid(kernel))),
            _ => return None,
        };
        Some(result)
    }

    fn name(&self) -> &'static str {
        "process_handler"
    }
}

pub fn sys_getpid(_kernel: &Kernel) -> Pid {
    curproc().pid()
}

/// Duplicate the calling process. The child gets a copy of the address
/// space, shares every open file, inherits the working directory and
/// resumes from a copy of `tf` seeing a return value of 0.
pub fn sys_fork(kernel: &Kernel, tf: &TrapFrame) -> SysResult<Pid> {
    let parent = curproc();
    let config = kernel.config();
    let child = kernel.procs().alloc_child(
        &parent,
        parent.name(),
        config.open_max,
        config.exit_notification,
    )?;

    let space = {
        let slot = parent.addrspace().lock();
        match slot.as_ref() {
            Some(space) => space.copy(),
            None => Err(Errno::Fault),
        }
    };
    let space = match space {
        Ok(space) => space,
        Err(e) => {
            warn!(parent = parent.pid(), error = %e, "fork: address space copy failed");
            kernel.procs().discard(&child);
            return Err(e);
        }
    };
    child.replace_addrspace(Some(space));
    child.set_cwd(parent.cwd());
    child.files().inherit_from(parent.files());

    let child_tf = tf.clone();
    let child_kernel = kernel.clone();
    let thread_name = format!("{}[{}]", child.name(), child.pid());
    let spawned = thread::thread_fork(&thread_name, Some(Arc::clone(&child)), move || {
        enter_forked_process(&child_kernel, child_tf);
    });

    match spawned {
        Ok(_detached) => {
            info!(parent = parent.pid(), child = child.pid(), "fork");
            Ok(child.pid())
        }
        Err(e) => {
            warn!(parent = parent.pid(), error = %e, "fork: thread creation failed");
            if let Err(close_err) = child.files().close_all() {
                warn!(child = child.pid(), error = %close_err, "fork rollback: close failed");
            }
            child.replace_addrspace(None);
            kernel.procs().discard(&child);
            Err(e)
        }
    }
}

/// Terminate the calling process with `status`. Never returns.
///
/// Descriptors are closed and the address space is released before the
/// status becomes visible, so a parent returning from waitpid never sees
/// resources still held by its child.
pub fn sys_exit(kernel: &Kernel, status: i32) -> ! {
    let proc = curproc();
    if let Err(e) = proc.files().close_all() {
        kpanic!("pid {}: closing descriptors at exit failed: {}", proc.pid(), e);
    }
    drop(proc.replace_addrspace(None));

    proc.exit_status().publish(status);
    kernel.procs().exit(&proc);
    info!(pid = proc.pid(), status = status & 0xff, "process exited");
    drop(proc);
    thread::thread_exit()
}

/// Wait for child `pid`, store its status at `status` unless NULL and reap
/// it. With WNOHANG a child that has not exited yields 0.
pub fn sys_waitpid(kernel: &Kernel, pid: Pid, status: UserPtr, options: i32) -> SysResult<Pid> {
    if !status.is_null() && (status.is_obviously_bad() || !status.is_aligned(4)) {
        return Err(Errno::Fault);
    }
    if options != 0 && options != WNOHANG {
        return Err(Errno::Inval);
    }

    let proc = curproc();
    let child = kernel.procs().waitable_child(&proc, pid)?;
    if options == WNOHANG && !child.has_exited() {
        return Ok(0);
    }

    let code = child.exit_status().wait();
    if !status.is_null() {
        copyout_u32(code as u32, status)?;
    }
    kernel.procs().reap(&child);
    debug!(pid = proc.pid(), child = pid, status = code, "waitpid reaped");
    Ok(pid)
}
