/*!
 * Current Directory Syscalls
 */

use super::callno::*;
use super::handler::SyscallHandler;
use super::{arg_ptr, curproc};
use crate::core::errors::Errno;
use crate::core::limits::PATH_MAX;
use crate::core::types::{SysResult, UserPtr};
use crate::kernel::Kernel;
use crate::machine::TrapFrame;
use crate::mm::{copyinstr, copyout, precheck_user_ptr};
use crate::vfs::Vfs;
use tracing::debug;

/// Handler for mkdir, chdir and __getcwd
pub struct CurdirHandler;

impl SyscallHandler for CurdirHandler {
    fn handle(&self, kernel: &Kernel, tf: &TrapFrame) -> Option<SysResult<i64>> {
        let result = match tf.v0 {
            SYS_MKDIR => sys_mkdir(kernel, arg_ptr(tf.a0), tf.a1 as u32).map(|_| 0),
            SYS_CHDIR => sys_chdir(kernel, arg_ptr(tf.a0)).map(|_| 0),
            SYS_GETCWD => sys_getcwd(kernel, arg_ptr(tf.a0), tf.a1 as usize).map(|n| n as i64),
            _ => return None,
        };
        Some(result)
    }

    fn name(&self) -> &'static str {
        "curdir_handler"
    }
}

fn copyin_path(path: UserPtr) -> SysResult<String> {
    precheck_user_ptr(path)?;
    let path = copyinstr(path, PATH_MAX)?;
    if path.is_empty() {
        return Err(Errno::Inval);
    }
    Ok(path)
}

pub fn sys_mkdir(kernel: &Kernel, path: UserPtr, mode: u32) -> SysResult<()> {
    let path = copyin_path(path)?;
    let proc = curproc();
    kernel.vfs().mkdir(&proc.cwd(), &path, mode)?;
    debug!(pid = proc.pid(), path = %path, "mkdir");
    Ok(())
}

/// Change the working directory. Empty path components are rejected
/// before the lookup.
pub fn sys_chdir(kernel: &Kernel, path: UserPtr) -> SysResult<()> {
    let path = copyin_path(path)?;
    if path.contains("//") {
        return Err(Errno::NotDir);
    }

    let proc = curproc();
    let cwd = proc.cwd();
    let stat = kernel.vfs().stat(&cwd, &path)?;
    if !stat.is_dir() {
        return Err(Errno::NotDir);
    }
    let target = Vfs::resolve(&cwd, &path).to_string_lossy().into_owned();
    debug!(pid = proc.pid(), from = %cwd, to = %target, "chdir");
    proc.set_cwd(target);
    Ok(())
}

/// Copy up to `len` bytes of the working directory name, without a
/// terminator, and return the count
pub fn sys_getcwd(_kernel: &Kernel, buf: UserPtr, len: usize) -> SysResult<usize> {
    precheck_user_ptr(buf)?;
    let cwd = curproc().cwd();
    let n = cwd.len().min(len);
    copyout(&cwd.as_bytes()[..n], buf)?;
    Ok(n)
}
