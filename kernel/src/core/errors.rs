/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes returned through the syscall side channel.
///
/// Numeric values follow the instructional kernel's `kern/errno.h` so that
/// user programs see the same codes the C library expects.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Diagnostic)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Errno {
    #[error("function not implemented")]
    #[diagnostic(code(errno::enosys))]
    NoSys,

    #[error("invalid argument")]
    #[diagnostic(code(errno::einval))]
    Inval,

    #[error("out of memory")]
    #[diagnostic(code(errno::enomem), help("The user page budget is exhausted."))]
    NoMem,

    #[error("bad memory reference")]
    #[diagnostic(code(errno::efault))]
    Fault,

    #[error("string too long")]
    #[diagnostic(code(errno::enametoolong))]
    NameTooLong,

    #[error("bad file number")]
    #[diagnostic(code(errno::ebadf))]
    BadF,

    #[error("no such file or directory")]
    #[diagnostic(code(errno::enoent))]
    NoEnt,

    #[error("no such process")]
    #[diagnostic(code(errno::esrch))]
    Srch,

    #[error("no child processes")]
    #[diagnostic(code(errno::echild))]
    Child,

    #[error("operation not permitted")]
    #[diagnostic(code(errno::eperm))]
    Perm,

    #[error("too many processes in system")]
    #[diagnostic(
        code(errno::enproc),
        help("The live process cap was reached. Reap exited children.")
    )]
    NProc,

    #[error("too many open files in process")]
    #[diagnostic(code(errno::emfile))]
    MFile,

    #[error("too many open files in system")]
    #[diagnostic(code(errno::enfile))]
    NFile,

    #[error("argument list too long")]
    #[diagnostic(code(errno::e2big))]
    TooBig,

    #[error("file is not executable")]
    #[diagnostic(code(errno::enoexec))]
    NoExec,

    #[error("not a directory")]
    #[diagnostic(code(errno::enotdir))]
    NotDir,

    #[error("is a directory")]
    #[diagnostic(code(errno::eisdir))]
    IsDir,

    #[error("file or object exists")]
    #[diagnostic(code(errno::eexist))]
    Exist,

    #[error("illegal seek")]
    #[diagnostic(code(errno::espipe))]
    SPipe,

    #[error("input/output error")]
    #[diagnostic(code(errno::eio))]
    Io,

    #[error("no space left on device")]
    #[diagnostic(code(errno::enospc))]
    NoSpc,

    #[error("read-only file system")]
    #[diagnostic(code(errno::erofs))]
    RoFs,
}

impl Errno {
    /// Numeric code placed in v0 when a syscall fails
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Errno::NoSys => 1,
            Errno::Inval => 8,
            Errno::NoMem => 3,
            Errno::Fault => 6,
            Errno::NameTooLong => 7,
            Errno::BadF => 30,
            Errno::NoEnt => 17,
            Errno::Srch => 10,
            Errno::Child => 11,
            Errno::Perm => 26,
            Errno::NProc => 9,
            Errno::MFile => 28,
            Errno::NFile => 29,
            Errno::TooBig => 5,
            Errno::NoExec => 12,
            Errno::NotDir => 18,
            Errno::IsDir => 19,
            Errno::Exist => 22,
            Errno::SPipe => 25,
            Errno::Io => 32,
            Errno::NoSpc => 35,
            Errno::RoFs => 36,
        }
    }

    /// Inverse of [`Errno::code`], used by the user side to decode v0
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        const ALL: [Errno; 22] = [
            Errno::NoSys,
            Errno::Inval,
            Errno::NoMem,
            Errno::Fault,
            Errno::NameTooLong,
            Errno::BadF,
            Errno::NoEnt,
            Errno::Srch,
            Errno::Child,
            Errno::Perm,
            Errno::NProc,
            Errno::MFile,
            Errno::NFile,
            Errno::TooBig,
            Errno::NoExec,
            Errno::NotDir,
            Errno::IsDir,
            Errno::Exist,
            Errno::SPipe,
            Errno::Io,
            Errno::NoSpc,
            Errno::RoFs,
        ];
        ALL.into_iter().find(|&e| e.code() == code)
    }
}

/// Errors surfaced to the host that boots and drives the kernel
#[derive(Error, Debug, Diagnostic)]
pub enum KernelError {
    #[error("syscall failed: {0}")]
    #[diagnostic(transparent)]
    Errno(#[from] Errno),

    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(kernel::configuration_error),
        help("Invalid configuration. Review configuration parameters.")
    )]
    Configuration(String),

    #[error("Boot error: {0}")]
    #[diagnostic(
        code(kernel::boot_error),
        help("A collaborator could not be initialized during bootstrap.")
    )]
    Boot(String),

    #[error("Thread error: {0}")]
    #[diagnostic(code(kernel::thread_error))]
    Thread(String),
}

impl From<serde_json::Error> for KernelError {
    fn from(err: serde_json::Error) -> Self {
        KernelError::Configuration(err.to_string())
    }
}
