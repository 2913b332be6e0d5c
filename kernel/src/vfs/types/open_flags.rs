/*!
 * VFS Open Flags
 * Decoded form of the flag word passed to open()
 */

use super::errors::VfsError;
use crate::core::limits::*;
use crate::core::types::AccessMode;
use serde::{Deserialize, Serialize};

/// Decoded open flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpenFlags {
    pub access: AccessMode,
    pub create: bool,
    pub exclusive: bool,
    pub truncate: bool,
    pub append: bool,
}

impl OpenFlags {
    #[inline]
    #[must_use]
    pub const fn new(access: AccessMode) -> Self {
        Self {
            access,
            create: false,
            exclusive: false,
            truncate: false,
            append: false,
        }
    }

    #[inline]
    #[must_use]
    pub const fn read_only() -> Self {
        Self::new(AccessMode::ReadOnly)
    }

    #[inline]
    #[must_use]
    pub const fn write_only() -> Self {
        Self::new(AccessMode::WriteOnly)
    }

    #[inline]
    #[must_use]
    pub const fn read_write() -> Self {
        Self::new(AccessMode::ReadWrite)
    }

    #[inline]
    #[must_use]
    pub const fn with_create(mut self) -> Self {
        self.create = true;
        self
    }

    #[inline]
    #[must_use]
    pub const fn with_truncate(mut self) -> Self {
        self.truncate = true;
        self
    }

    #[inline]
    #[must_use]
    pub const fn is_writable(&self) -> bool {
        self.access.can_write()
    }

    /// Decode a POSIX-style flag word.
    ///
    /// Exactly one access mode must be given and no unknown bits may be set.
    pub fn from_posix(flags: u32) -> Result<Self, VfsError> {
        if flags & !O_VALID_MASK != 0 {
            return Err(VfsError::InvalidArgument(format!(
                "unknown open flags {:#x}",
                flags & !O_VALID_MASK
            )));
        }
        let access = match flags & O_ACCMODE {
            O_RDONLY => AccessMode::ReadOnly,
            O_WRONLY => AccessMode::WriteOnly,
            O_RDWR => AccessMode::ReadWrite,
            _ => {
                return Err(VfsError::InvalidArgument(
                    "more than one access mode".to_string(),
                ))
            }
        };
        Ok(Self {
            access,
            create: flags & O_CREAT != 0,
            exclusive: flags & O_EXCL != 0,
            truncate: flags & O_TRUNC != 0,
            append: flags & O_APPEND != 0,
        })
    }

    /// Encode back to a POSIX-style flag word
    #[must_use]
    pub fn to_posix(&self) -> u32 {
        let mut flags = match self.access {
            AccessMode::ReadOnly => O_RDONLY,
            AccessMode::WriteOnly => O_WRONLY,
            AccessMode::ReadWrite => O_RDWR,
        };
        if self.create {
            flags |= O_CREAT;
        }
        if self.exclusive {
            flags |= O_EXCL;
        }
        if self.truncate {
            flags |= O_TRUNC;
        }
        if self.append {
            flags |= O_APPEND;
        }
        flags
    }
}
