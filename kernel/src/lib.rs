/*!
 * minikern
 *
 * Process lifecycle and synchronization core of a small teaching kernel,
 * hosted on the machine it runs on: kernel threads are host threads, user
 * programs are closures that trap into the syscall layer, and user memory
 * is a simulated paged address space.
 */

pub mod core;
pub mod file;
pub mod kernel;
pub mod machine;
pub mod mm;
pub mod monitoring;
pub mod process;
pub mod syscalls;
pub mod thread;
pub mod vfs;

// Re-exports
pub use crate::core::{Errno, ExitNotification, KernelConfig, KernelError, KernelResult, SysResult};
pub use crate::core::sync::{Cv, Lock, LockGuard, Semaphore, Spinlock};
pub use file::{FileTable, OpenFile, OpenFilePool};
pub use kernel::{Kernel, KernelBuilder};
pub use machine::{TrapFrame, UserCtx};
pub use monitoring::{init_tracing, try_init_tracing};
pub use process::{Process, ProcessState, ProcessTable};
pub use vfs::{BufferConsole, Console, MemFs, StdioConsole};
