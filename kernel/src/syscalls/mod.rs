/*!
 * Syscalls Module
 *
 * Trap entry for user programs. The dispatcher reads the call number from
 * v0 and the arguments from a0..a3, hands the frame to the handler family
 * that owns the number, and writes the outcome back: the value in v0 with
 * a3 = 0, or the errno in v0 with a3 = 1. Either way epc moves past the
 * trapping instruction.
 */

pub mod callno;
pub mod curdir;
pub mod exec;
pub mod file;
pub mod handler;
pub mod process;

pub use exec::ArgBlock;
pub use handler::{SyscallHandler, SyscallHandlerRegistry};

use crate::core::errors::Errno;
use crate::kernel::Kernel;
use crate::machine::TrapFrame;
use crate::monitoring::SyscallSpan;
use crate::process::Process;
use crate::{kpanic, thread};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Service the syscall held in `tf`
pub fn syscall(kernel: &Kernel, tf: &mut TrapFrame) {
    let num = tf.v0;
    let name = callno::name(num);
    let pid = thread::curproc().map(|p| p.pid()).unwrap_or_default();
    let span = SyscallSpan::new(name, pid);
    let _entered = span.enter();
    trace!(a0 = tf.a0, a1 = tf.a1, a2 = tf.a2, "syscall entry");

    match kernel.syscalls().dispatch(kernel, tf) {
        Some(Ok(value)) => {
            span.record_return(value);
            tf.set_return(value);
        }
        Some(Err(errno)) => {
            debug!(pid, syscall = name, error = %errno, "syscall failed");
            span.record_error(&errno.to_string());
            tf.set_error(errno.code());
        }
        None => {
            warn!(pid, num, "unknown syscall");
            span.record_error("unknown syscall");
            tf.set_error(Errno::NoSys.code());
        }
    }
}

/// The process the trapping thread runs for. Syscalls only arrive from
/// threads bound to a process, so a missing binding is fatal.
pub(crate) fn curproc() -> Arc<Process> {
    match thread::curproc() {
        Some(proc) => proc,
        None => kpanic!("syscall from thread {} with no process", thread::current_id()),
    }
}

/// Register value as a 32-bit integer argument
#[inline]
pub(crate) fn arg_i32(reg: i64) -> i32 {
    reg as i32
}

/// Register value as a user pointer
#[inline]
pub(crate) fn arg_ptr(reg: i64) -> crate::core::types::UserPtr {
    crate::core::types::UserPtr(reg as u32)
}
