/*!
 * Syscall Numbers
 * Values match the instructional kernel's `kern/syscall.h`
 */

pub const SYS_FORK: i64 = 0;
pub const SYS_VFORK: i64 = 1;
pub const SYS_EXECV: i64 = 2;
pub const SYS_EXIT: i64 = 3;
pub const SYS_WAITPID: i64 = 4;
pub const SYS_GETPID: i64 = 5;
pub const SYS_OPEN: i64 = 45;
pub const SYS_DUP2: i64 = 48;
pub const SYS_CLOSE: i64 = 49;
pub const SYS_READ: i64 = 50;
pub const SYS_WRITE: i64 = 55;
pub const SYS_LSEEK: i64 = 59;
pub const SYS_MKDIR: i64 = 68;
pub const SYS_FSTAT: i64 = 76;
pub const SYS_CHDIR: i64 = 80;
pub const SYS_GETCWD: i64 = 82;

/// Name used in trace output
pub fn name(num: i64) -> &'static str {
    match num {
        SYS_FORK => "fork",
        SYS_VFORK => "vfork",
        SYS_EXECV => "execv",
        SYS_EXIT => "_exit",
        SYS_WAITPID => "waitpid",
        SYS_GETPID => "getpid",
        SYS_OPEN => "open",
        SYS_DUP2 => "dup2",
        SYS_CLOSE => "close",
        SYS_READ => "read",
        SYS_WRITE => "write",
        SYS_LSEEK => "lseek",
        SYS_MKDIR => "mkdir",
        SYS_FSTAT => "fstat",
        SYS_CHDIR => "chdir",
        SYS_GETCWD => "__getcwd",
        _ => "unknown",
    }
}
