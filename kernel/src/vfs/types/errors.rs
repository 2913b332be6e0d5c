/*!
 * VFS Error Types
 * Structured errors for filesystem operations, mapped onto errno codes
 */

use crate::core::errors::Errno;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// VFS operation result
#[must_use = "VFS operations can fail and must be handled"]
pub type VfsResult<T> = Result<T, VfsError>;

/// VFS errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "error", content = "details")]
pub enum VfsError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Is a directory: {0}")]
    IsADirectory(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Out of space")]
    OutOfSpace,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Read-only filesystem")]
    ReadOnly,
}

impl From<VfsError> for Errno {
    fn from(err: VfsError) -> Self {
        match err {
            VfsError::NotFound(_) => Errno::NoEnt,
            VfsError::AlreadyExists(_) => Errno::Exist,
            VfsError::NotADirectory(_) => Errno::NotDir,
            VfsError::IsADirectory(_) => Errno::IsDir,
            VfsError::InvalidPath(_) | VfsError::InvalidArgument(_) => Errno::Inval,
            VfsError::IoError(_) => Errno::Io,
            VfsError::NotSupported(_) => Errno::NoSys,
            VfsError::OutOfSpace => Errno::NoSpc,
            VfsError::ReadOnly => Errno::RoFs,
        }
    }
}
