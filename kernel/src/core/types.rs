/*!
 * Core Types
 * Common types used across the kernel
 */

use super::limits::{INVALID_PTR, KERNEL_PTR, PAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Process ID type
pub type Pid = i32;

/// File descriptor type
pub type Fd = i32;

/// Virtual address in the 32-bit user address space
pub type VAddr = u32;

/// File offset
pub type Off = i64;

/// Common result type for syscall-level operations
pub type SysResult<T> = Result<T, super::errors::Errno>;

/// Common result type for host-facing kernel operations
pub type KernelResult<T> = Result<T, super::errors::KernelError>;

/// A user-space address as handed to a syscall.
///
/// Nothing is dereferenced through a `UserPtr` directly; all access goes
/// through the checked copy routines in `mm::copyinout`.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct UserPtr(pub VAddr);

impl UserPtr {
    pub const NULL: UserPtr = UserPtr(0);

    #[inline]
    #[must_use]
    pub const fn new(addr: VAddr) -> Self {
        Self(addr)
    }

    #[inline]
    #[must_use]
    pub const fn addr(self) -> VAddr {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Cheap rejection of pointers that can never be valid user buffers:
    /// null, the reserved invalid sentinel, and anything in kernel space.
    #[inline]
    #[must_use]
    pub const fn is_obviously_bad(self) -> bool {
        self.0 == 0 || self.0 == INVALID_PTR || self.0 >= KERNEL_PTR
    }

    #[inline]
    #[must_use]
    pub const fn is_aligned(self, align: u32) -> bool {
        self.0 % align == 0
    }

    #[inline]
    #[must_use]
    pub const fn offset(self, bytes: u32) -> Self {
        Self(self.0.wrapping_add(bytes))
    }

    #[inline]
    #[must_use]
    pub const fn page(self) -> u32 {
        self.0 / PAGE_SIZE as u32
    }
}

impl fmt::Debug for UserPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserPtr({:#010x})", self.0)
    }
}

impl fmt::Display for UserPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl From<VAddr> for UserPtr {
    fn from(addr: VAddr) -> Self {
        Self(addr)
    }
}

/// Access mode of an open file, taken from the low bits of the open flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl AccessMode {
    #[inline]
    #[must_use]
    pub const fn can_read(self) -> bool {
        matches!(self, AccessMode::ReadOnly | AccessMode::ReadWrite)
    }

    #[inline]
    #[must_use]
    pub const fn can_write(self) -> bool {
        matches!(self, AccessMode::WriteOnly | AccessMode::ReadWrite)
    }
}

/// Seek origin for lseek
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Whence {
    Set,
    Cur,
    End,
}

impl Whence {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            super::limits::SEEK_SET => Some(Whence::Set),
            super::limits::SEEK_CUR => Some(Whence::Cur),
            super::limits::SEEK_END => Some(Whence::End),
            _ => None,
        }
    }
}
