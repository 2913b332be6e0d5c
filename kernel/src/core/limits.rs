/*!
 * System Limits and Constants
 *
 * Fixed ABI values shared by the kernel and the simulated user side.
 * Tunable limits (process cap, descriptor table size, page budget) live in
 * `core::config::KernelConfig`; the values here are the defaults it uses.
 */

// =============================================================================
// ADDRESS SPACE LAYOUT
// =============================================================================

/// Page size of the simulated MMU (4KB)
pub const PAGE_SIZE: usize = 4096;

/// First kernel address; every user pointer must lie below it
pub const KERNEL_PTR: u32 = 0x8000_0000;

/// Reserved address that is never mapped in any user address space
pub const INVALID_PTR: u32 = 0x4000_0000;

/// Top of the user stack (grows down from the kernel boundary)
pub const USERSTACK: u32 = KERNEL_PTR;

/// Base of the text segment produced by the loader
pub const TEXT_BASE: u32 = 0x0040_0000;

/// Base of the user heap region
pub const HEAP_BASE: u32 = 0x1000_0000;

/// Width of a user pointer in bytes
pub const USER_PTR_SIZE: usize = 4;

// =============================================================================
// PROCESS LIMITS
// =============================================================================

/// Pid of the kernel process (process zero)
pub const KERNEL_PID: i32 = 1;

/// Lowest pid handed to a user process
pub const PID_MIN: i32 = 2;

/// Highest pid handed to a user process
pub const PID_MAX: i32 = 32767;

/// Default cap on live user processes
pub const DEFAULT_MAX_PROCS: usize = 100;

/// Default per-process descriptor table size
pub const DEFAULT_OPEN_MAX: usize = 128;

/// Default maximum number of argv entries accepted by execv
pub const DEFAULT_MAX_EXEC_ARGS: usize = 64;

/// Default cap on marshalled exec argument bytes (64KB)
pub const DEFAULT_ARG_MAX: usize = 64 * 1024;

/// Default number of user pages the whole system may hold
pub const DEFAULT_USER_PAGES: usize = 4096;

/// Default user stack size in pages
pub const DEFAULT_STACK_PAGES: usize = 18;

/// Default user heap size in pages
pub const DEFAULT_HEAP_PAGES: usize = 64;

/// Longest path accepted from user space, including the terminator
pub const PATH_MAX: usize = 1024;

// =============================================================================
// FILE ABI
// =============================================================================

pub const STDIN_FILENO: i32 = 0;
pub const STDOUT_FILENO: i32 = 1;
pub const STDERR_FILENO: i32 = 2;

pub const O_RDONLY: u32 = 0;
pub const O_WRONLY: u32 = 1;
pub const O_RDWR: u32 = 2;
pub const O_ACCMODE: u32 = 3;
pub const O_CREAT: u32 = 4;
pub const O_EXCL: u32 = 8;
pub const O_TRUNC: u32 = 16;
pub const O_APPEND: u32 = 32;
pub const O_NOCTTY: u32 = 64;

/// Every flag bit open() understands
pub const O_VALID_MASK: u32 = O_ACCMODE | O_CREAT | O_EXCL | O_TRUNC | O_APPEND | O_NOCTTY;

pub const SEEK_SET: i32 = 0;
pub const SEEK_CUR: i32 = 1;
pub const SEEK_END: i32 = 2;

/// waitpid option: return immediately if the child has not exited
pub const WNOHANG: i32 = 1;

/// Name of the console device
pub const CONSOLE_DEVICE: &str = "con:";
