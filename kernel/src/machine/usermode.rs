/*!
 * Simulated User Mode
 *
 * User programs are Rust closures that run on a kernel thread bound to their
 * process. They see only user addresses and reach the kernel by building a
 * trap frame and trapping through the syscall dispatcher, the same way a C
 * library stub would. `UserCtx` is that library: argument marshalling into
 * user memory, a bump allocator on the heap, and one wrapper per syscall.
 */

use super::loader;
use super::trapframe::TrapFrame;
use crate::core::errors::Errno;
use crate::core::limits::{PATH_MAX, USER_PTR_SIZE};
use crate::core::types::{Fd, Off, Pid, SysResult, UserPtr, VAddr};
use crate::kernel::Kernel;
use crate::mm::AddrSpace;
use crate::syscalls::{self, callno::*};
use crate::vfs::Stat;
use crate::{kpanic, thread};
use std::sync::Arc;
use tracing::{error, trace};

/// Execution context of a running user program
pub struct UserCtx {
    kernel: Kernel,
    argc: usize,
    argv: UserPtr,
    sp: VAddr,
}

/// Start the program loaded at `entry` in the current address space.
/// Never returns: when the program body returns `n`, `_exit(n)` runs.
pub fn enter_new_process(kernel: &Kernel, argc: usize, argv: UserPtr, sp: VAddr, entry: VAddr) -> ! {
    let mut ctx = UserCtx {
        kernel: kernel.clone(),
        argc,
        argv,
        sp,
    };
    let program = ctx
        .with_space(|space| loader::program_at(space, entry))
        .and_then(|name| kernel.programs().get(&name).ok_or(Errno::NoExec));

    let status = match program {
        Ok(body) => {
            trace!(argc, entry = format_args!("{:#x}", entry), "entering user mode");
            body(&mut ctx)
        }
        Err(e) => {
            error!(error = %e, entry = format_args!("{:#x}", entry), "no code at entry point");
            255
        }
    };
    ctx.exit(status)
}

/// Resume a forked child from its copy of the parent's trap frame.
/// The child observes a successful fork returning 0.
pub fn enter_forked_process(kernel: &Kernel, mut tf: TrapFrame) -> ! {
    tf.set_return(0);
    let mut ctx = UserCtx {
        kernel: kernel.clone(),
        argc: 0,
        argv: UserPtr::NULL,
        sp: tf.sp as VAddr,
    };
    let status = match tf.continuation.take() {
        Some(body) => body(&mut ctx),
        None => 0,
    };
    ctx.exit(status)
}

impl UserCtx {
    pub fn argc(&self) -> usize {
        self.argc
    }

    pub fn argv(&self) -> UserPtr {
        self.argv
    }

    pub fn sp(&self) -> VAddr {
        self.sp
    }

    fn with_space<R>(&self, f: impl FnOnce(&mut AddrSpace) -> SysResult<R>) -> SysResult<R> {
        let proc = thread::curproc().ok_or(Errno::Fault)?;
        let mut slot = proc.addrspace().lock();
        let space = slot.as_mut().ok_or(Errno::Fault)?;
        f(space)
    }

    // --- user memory ---

    /// Reserve `len` bytes of heap, 4-byte aligned
    pub fn alloc(&mut self, len: usize) -> SysResult<UserPtr> {
        self.with_space(|space| {
            let align = USER_PTR_SIZE as u64;
            let start = (space.brk() as u64 + align - 1) / align * align;
            let end = start + len as u64;
            let end = VAddr::try_from(end).map_err(|_| Errno::NoMem)?;
            space.set_brk(end)?;
            Ok(UserPtr(start as VAddr))
        })
    }

    pub fn poke(&mut self, ptr: UserPtr, data: &[u8]) -> SysResult<()> {
        self.with_space(|space| space.write(ptr.addr(), data))
    }

    pub fn peek(&self, ptr: UserPtr, len: usize) -> SysResult<Vec<u8>> {
        self.with_space(|space| {
            let mut buf = vec![0u8; len];
            space.read(ptr.addr(), &mut buf)?;
            Ok(buf)
        })
    }

    pub fn poke_u32(&mut self, ptr: UserPtr, value: u32) -> SysResult<()> {
        self.poke(ptr, &value.to_le_bytes())
    }

    pub fn peek_u32(&self, ptr: UserPtr) -> SysResult<u32> {
        let bytes = self.peek(ptr, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Copy `s` plus a NUL onto the heap
    pub fn push_str(&mut self, s: &str) -> SysResult<UserPtr> {
        let ptr = self.alloc(s.len() + 1)?;
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        self.poke(ptr, &bytes)?;
        Ok(ptr)
    }

    /// Read a NUL-terminated string
    pub fn peek_str(&self, ptr: UserPtr) -> SysResult<String> {
        self.with_space(|space| {
            let mut out = Vec::new();
            let mut byte = [0u8; 1];
            for i in 0..PATH_MAX as u32 {
                space.read(ptr.addr().wrapping_add(i), &mut byte)?;
                if byte[0] == 0 {
                    return String::from_utf8(out).map_err(|_| Errno::Inval);
                }
                out.push(byte[0]);
            }
            Err(Errno::NameTooLong)
        })
    }

    /// Run `f` with heap allocations discarded afterwards
    fn scratch<R>(&mut self, f: impl FnOnce(&mut Self) -> SysResult<R>) -> SysResult<R> {
        let mark = self.with_space(|space| Ok(space.brk()))?;
        let result = f(self);
        let _ = self.with_space(|space| space.set_brk(mark));
        result
    }

    /// Program arguments as passed to execv / runprogram
    pub fn args(&self) -> SysResult<Vec<String>> {
        (0..self.argc)
            .map(|i| {
                let slot = self.argv.offset((i * USER_PTR_SIZE) as u32);
                let ptr = self.peek_u32(slot)?;
                self.peek_str(UserPtr(ptr))
            })
            .collect()
    }

    // --- traps ---

    fn trap(&mut self, tf: &mut TrapFrame) -> SysResult<i64> {
        tf.sp = self.sp as u64;
        syscalls::syscall(&self.kernel, tf);
        if tf.failed() {
            Err(Errno::from_code(tf.v0 as i32).unwrap_or(Errno::Inval))
        } else {
            Ok(tf.v0)
        }
    }

    /// Raw trap with explicit argument registers
    pub fn syscall(&mut self, num: i64, args: [i64; 4]) -> SysResult<i64> {
        let mut tf = TrapFrame::syscall(num, args);
        self.trap(&mut tf)
    }

    pub fn getpid(&mut self) -> SysResult<Pid> {
        self.syscall(SYS_GETPID, [0; 4]).map(|v| v as Pid)
    }

    pub fn open(&mut self, path: &str, flags: u32, mode: u32) -> SysResult<Fd> {
        self.scratch(|ctx| {
            let p = ctx.push_str(path)?;
            ctx.syscall(SYS_OPEN, [p.addr() as i64, flags as i64, mode as i64, 0])
        })
        .map(|fd| fd as Fd)
    }

    pub fn close(&mut self, fd: Fd) -> SysResult<()> {
        self.syscall(SYS_CLOSE, [fd as i64, 0, 0, 0]).map(|_| ())
    }

    pub fn read(&mut self, fd: Fd, len: usize) -> SysResult<Vec<u8>> {
        self.scratch(|ctx| {
            let buf = ctx.alloc(len)?;
            let n = ctx.syscall(SYS_READ, [fd as i64, buf.addr() as i64, len as i64, 0])?;
            ctx.peek(buf, n as usize)
        })
    }

    pub fn write(&mut self, fd: Fd, data: &[u8]) -> SysResult<usize> {
        self.scratch(|ctx| {
            let buf = ctx.alloc(data.len())?;
            ctx.poke(buf, data)?;
            ctx.syscall(SYS_WRITE, [fd as i64, buf.addr() as i64, data.len() as i64, 0])
        })
        .map(|n| n as usize)
    }

    pub fn lseek(&mut self, fd: Fd, offset: Off, whence: i32) -> SysResult<Off> {
        self.syscall(SYS_LSEEK, [fd as i64, offset, whence as i64, 0])
    }

    pub fn dup2(&mut self, oldfd: Fd, newfd: Fd) -> SysResult<Fd> {
        self.syscall(SYS_DUP2, [oldfd as i64, newfd as i64, 0, 0])
            .map(|fd| fd as Fd)
    }

    pub fn fstat(&mut self, fd: Fd) -> SysResult<Stat> {
        self.scratch(|ctx| {
            let buf = ctx.alloc(Stat::encoded_len())?;
            ctx.syscall(SYS_FSTAT, [fd as i64, buf.addr() as i64, 0, 0])?;
            let bytes = ctx.peek(buf, Stat::encoded_len())?;
            Stat::decode(&bytes).map_err(Errno::from)
        })
    }

    pub fn mkdir(&mut self, path: &str, mode: u32) -> SysResult<()> {
        self.scratch(|ctx| {
            let p = ctx.push_str(path)?;
            ctx.syscall(SYS_MKDIR, [p.addr() as i64, mode as i64, 0, 0])
        })
        .map(|_| ())
    }

    pub fn chdir(&mut self, path: &str) -> SysResult<()> {
        self.scratch(|ctx| {
            let p = ctx.push_str(path)?;
            ctx.syscall(SYS_CHDIR, [p.addr() as i64, 0, 0, 0])
        })
        .map(|_| ())
    }

    pub fn getcwd(&mut self) -> SysResult<String> {
        self.scratch(|ctx| {
            let buf = ctx.alloc(PATH_MAX)?;
            let n = ctx.syscall(SYS_GETCWD, [buf.addr() as i64, PATH_MAX as i64, 0, 0])?;
            let bytes = ctx.peek(buf, n as usize)?;
            String::from_utf8(bytes).map_err(|_| Errno::Inval)
        })
    }

    /// Fork. The parent gets the child's pid; the child runs `child` and
    /// exits with its return value.
    pub fn fork<F>(&mut self, child: F) -> SysResult<Pid>
    where
        F: Fn(&mut UserCtx) -> i32 + Send + Sync + 'static,
    {
        let (argc, argv) = (self.argc, self.argv);
        let mut tf = TrapFrame::syscall(SYS_FORK, [0; 4]);
        tf.continuation = Some(Arc::new(move |ctx: &mut UserCtx| {
            ctx.argc = argc;
            ctx.argv = argv;
            child(ctx)
        }));
        self.trap(&mut tf).map(|pid| pid as Pid)
    }

    /// Replace the running program. Returns only on failure.
    pub fn execv(&mut self, path: &str, args: &[&str]) -> Errno {
        let outcome = self.scratch(|ctx| {
            let p = ctx.push_str(path)?;
            let mut ptrs = Vec::with_capacity(args.len());
            for arg in args {
                ptrs.push(ctx.push_str(arg)?);
            }
            let argv = ctx.alloc((ptrs.len() + 1) * USER_PTR_SIZE)?;
            for (i, ptr) in ptrs.iter().enumerate() {
                ctx.poke_u32(argv.offset((i * USER_PTR_SIZE) as u32), ptr.addr())?;
            }
            ctx.poke_u32(argv.offset((ptrs.len() * USER_PTR_SIZE) as u32), 0)?;
            ctx.syscall(SYS_EXECV, [p.addr() as i64, argv.addr() as i64, 0, 0])
        });
        match outcome {
            Ok(_) => kpanic!("execv returned success to its caller"),
            Err(e) => e,
        }
    }

    /// Wait for `pid`; returns the reaped pid (0 for WNOHANG when not
    /// ready) and the status word the kernel wrote
    pub fn waitpid(&mut self, pid: Pid, options: i32) -> SysResult<(Pid, i32)> {
        self.scratch(|ctx| {
            let status = ctx.alloc(4)?;
            ctx.poke_u32(status, 0)?;
            let reaped = ctx.syscall(
                SYS_WAITPID,
                [pid as i64, status.addr() as i64, options as i64, 0],
            )?;
            let code = ctx.peek_u32(status)? as i32;
            Ok((reaped as Pid, code))
        })
    }

    /// Terminate the process. Never returns.
    pub fn exit(&mut self, status: i32) -> ! {
        let mut tf = TrapFrame::syscall(SYS_EXIT, [status as i64, 0, 0, 0]);
        tf.sp = self.sp as u64;
        syscalls::syscall(&self.kernel, &mut tf);
        kpanic!("_exit returned to user mode")
    }
}
