/*!
 * File Syscalls
 * open, close, read, write, lseek, dup2 and fstat over the descriptor table
 */

use super::callno::*;
use super::handler::SyscallHandler;
use super::{arg_i32, arg_ptr, curproc};
use crate::core::errors::Errno;
use crate::core::limits::{PATH_MAX, STDERR_FILENO, STDIN_FILENO, STDOUT_FILENO};
use crate::core::types::{Fd, Off, SysResult, UserPtr, Whence};
use crate::file::OpenFile;
use crate::kernel::Kernel;
use crate::machine::TrapFrame;
use crate::mm::{check_user_range, copyin, copyinstr, copyout, precheck_user_ptr};
use crate::vfs::console::{console_read, console_write};
use crate::vfs::OpenFlags;
use std::sync::Arc;
use tracing::{debug, warn};

/// Handler for descriptor syscalls
pub struct FileHandler;

impl SyscallHandler for FileHandler {
    fn handle(&self, kernel: &Kernel, tf: &TrapFrame) -> Option<SysResult<i64>> {
        let result = match tf.v0 {
            SYS_OPEN => sys_open(kernel, arg_ptr(tf.a0), tf.a1 as u32, tf.a2 as u32).map(i64::from),
            SYS_CLOSE => sys_close(kernel, arg_i32(tf.a0)).map(|_| 0),
            SYS_READ => sys_read(kernel, arg_i32(tf.a0), arg_ptr(tf.a1), tf.a2 as usize)
                .map(|n| n as i64),
            SYS_WRITE => sys_write(kernel, arg_i32(tf.a0), arg_ptr(tf.a1), tf.a2 as usize)
                .map(|n| n as i64),
            SYS_LSEEK => sys_lseek(kernel, arg_i32(tf.a0), tf.a1, arg_i32(tf.a2)),
            SYS_DUP2 => sys_dup2(kernel, arg_i32(tf.a0), arg_i32(tf.a1)).map(i64::from),
            SYS_FSTAT => sys_fstat(kernel, arg_i32(tf.a0), arg_ptr(tf.a1)).map(|_| 0),
            _ => return None,
        };
        Some(result)
    }

    fn name(&self) -> &'static str {
        "file_handler"
    }
}

fn is_std_stream(fd: Fd) -> bool {
    (STDIN_FILENO..=STDERR_FILENO).contains(&fd)
}

/// Open `path` and install it at the lowest free descriptor
pub fn sys_open(kernel: &Kernel, path: UserPtr, flags: u32, mode: u32) -> SysResult<Fd> {
    precheck_user_ptr(path)?;
    let flags = OpenFlags::from_posix(flags).map_err(|_| Errno::Inval)?;
    let path = copyinstr(path, PATH_MAX)?;
    if path.is_empty() {
        return Err(Errno::Inval);
    }

    let proc = curproc();
    let vnode = kernel.vfs().open(&proc.cwd(), &path, flags, mode)?;
    let file = OpenFile::open(kernel.pool(), vnode, flags.access, flags.append, path)?;

    match proc.files().install(Arc::clone(&file)) {
        Ok(fd) => {
            debug!(pid = proc.pid(), fd, file = file.name(), "opened");
            Ok(fd)
        }
        Err(e) => {
            if let Err(close_err) = file.decref() {
                warn!(file = file.name(), error = %close_err, "close after failed install");
            }
            Err(e)
        }
    }
}

pub fn sys_close(_kernel: &Kernel, fd: Fd) -> SysResult<()> {
    curproc().files().close(fd)
}

/// Read into user memory. Standard streams that were never opened fall
/// back to the console.
pub fn sys_read(kernel: &Kernel, fd: Fd, buf: UserPtr, len: usize) -> SysResult<usize> {
    precheck_user_ptr(buf)?;
    check_user_range(buf, len)?;

    match curproc().files().get(fd) {
        Ok(file) => file.read_with(len, |bytes| copyout(bytes, buf)),
        Err(_) if fd == STDIN_FILENO => {
            let mut data = vec![0u8; len];
            let n = console_read(kernel.vfs().console().as_ref(), &mut data);
            copyout(&data[..n], buf)?;
            Ok(n)
        }
        Err(_) if is_std_stream(fd) => Err(Errno::Inval),
        Err(e) => Err(e),
    }
}

/// Write from user memory. Standard streams that were never opened fall
/// back to the console.
pub fn sys_write(kernel: &Kernel, fd: Fd, buf: UserPtr, len: usize) -> SysResult<usize> {
    precheck_user_ptr(buf)?;
    check_user_range(buf, len)?;

    match curproc().files().get(fd) {
        Ok(file) => {
            let mut data = vec![0u8; len];
            copyin(buf, &mut data)?;
            file.write(&data)
        }
        Err(_) if fd == STDOUT_FILENO || fd == STDERR_FILENO => {
            let mut data = vec![0u8; len];
            copyin(buf, &mut data)?;
            Ok(console_write(kernel.vfs().console().as_ref(), &data))
        }
        Err(_) if fd == STDIN_FILENO => Err(Errno::Inval),
        Err(e) => Err(e),
    }
}

/// Reposition the offset of `fd`. Standard input cannot be repositioned.
pub fn sys_lseek(_kernel: &Kernel, fd: Fd, offset: Off, whence: i32) -> SysResult<Off> {
    if fd == STDIN_FILENO {
        return Err(Errno::Inval);
    }
    let file = curproc().files().get(fd)?;
    let whence = Whence::from_raw(whence).ok_or(Errno::Inval)?;
    file.seek(offset, whence)
}

pub fn sys_dup2(_kernel: &Kernel, oldfd: Fd, newfd: Fd) -> SysResult<Fd> {
    curproc().files().dup2(oldfd, newfd)
}

/// Copy the encoded `Stat` of `fd` to user memory
pub fn sys_fstat(_kernel: &Kernel, fd: Fd, buf: UserPtr) -> SysResult<()> {
    precheck_user_ptr(buf)?;
    if is_std_stream(fd) {
        return Err(Errno::NoSys);
    }
    let file = curproc().files().get(fd)?;
    let stat = file.stat()?;
    let bytes = stat.encode().map_err(Errno::from)?;
    copyout(&bytes, buf)
}
