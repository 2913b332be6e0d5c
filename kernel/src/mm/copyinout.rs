/*!
 * User Memory Copy
 *
 * Checked transfers between kernel buffers and the current process's
 * address space. Every routine fails with EFAULT instead of touching an
 * unmapped or kernel-range address.
 */

use super::addrspace::AddrSpace;
use crate::core::errors::Errno;
use crate::core::types::{SysResult, UserPtr};
use crate::thread;

/// Reject null, the reserved invalid pointer and kernel-range addresses
#[inline]
pub fn precheck_user_ptr(ptr: UserPtr) -> SysResult<()> {
    if ptr.is_obviously_bad() {
        Err(Errno::Fault)
    } else {
        Ok(())
    }
}

fn with_current_as<R>(f: impl FnOnce(&mut AddrSpace) -> SysResult<R>) -> SysResult<R> {
    let proc = thread::curproc().ok_or(Errno::Fault)?;
    let mut slot = proc.addrspace().lock();
    let space = slot.as_mut().ok_or(Errno::Fault)?;
    f(space)
}

/// EFAULT unless all of `[ptr, ptr + len)` is mapped in the current process
pub fn check_user_range(ptr: UserPtr, len: usize) -> SysResult<()> {
    precheck_user_ptr(ptr)?;
    with_current_as(|space| {
        if space.is_mapped(ptr.addr(), len) {
            Ok(())
        } else {
            Err(Errno::Fault)
        }
    })
}

/// Copy `buf.len()` bytes in from user address `src`
pub fn copyin(src: UserPtr, buf: &mut [u8]) -> SysResult<()> {
    if buf.is_empty() {
        return Ok(());
    }
    precheck_user_ptr(src)?;
    with_current_as(|space| space.read(src.addr(), buf))
}

/// Copy `data` out to user address `dst`
pub fn copyout(data: &[u8], dst: UserPtr) -> SysResult<()> {
    if data.is_empty() {
        return Ok(());
    }
    precheck_user_ptr(dst)?;
    with_current_as(|space| space.write(dst.addr(), data))
}

pub fn copyin_u32(src: UserPtr) -> SysResult<u32> {
    let mut raw = [0u8; 4];
    copyin(src, &mut raw)?;
    Ok(u32::from_le_bytes(raw))
}

pub fn copyout_u32(value: u32, dst: UserPtr) -> SysResult<()> {
    copyout(&value.to_le_bytes(), dst)
}

/// Copy in a NUL-terminated string of at most `max` bytes including the NUL.
///
/// ENAMETOOLONG if no terminator appears within `max` bytes; EINVAL if the
/// bytes are not UTF-8.
pub fn copyinstr(src: UserPtr, max: usize) -> SysResult<String> {
    precheck_user_ptr(src)?;
    let bytes = with_current_as(|space| {
        let mut out = Vec::new();
        let mut byte = [0u8; 1];
        for i in 0..max {
            let addr = src.addr().checked_add(i as u32).ok_or(Errno::Fault)?;
            space.read(addr, &mut byte)?;
            if byte[0] == 0 {
                return Ok(out);
            }
            out.push(byte[0]);
        }
        Err(Errno::NameTooLong)
    })?;
    String::from_utf8(bytes).map_err(|_| Errno::Inval)
}

