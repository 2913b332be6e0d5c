/*!
 * Trap Dispatch Tests
 * Register conventions of the syscall entry point, driven without user code
 */

use crate::common::Rig;
use minikern::core::limits::{INVALID_PTR, KERNEL_PTR, O_RDONLY};
use minikern::machine::{TrapFrame, INSN_SIZE};
use minikern::syscalls::callno::*;
use minikern::syscalls::{syscall, SyscallHandler, SyscallHandlerRegistry};
use minikern::{thread, Errno, ExitNotification, Kernel, KernelBuilder, KernelConfig, Process, SysResult};
use pretty_assertions::assert_eq;
use std::sync::Arc;

/// Run `f` on this thread bound to a fresh process that never enters
/// user mode
fn as_process<R>(kernel: &Kernel, f: impl FnOnce(&Arc<Process>) -> R) -> R {
    let proc = kernel
        .procs()
        .alloc_child(
            kernel.kernel_process(),
            "trap",
            kernel.config().open_max,
            ExitNotification::Condvar,
        )
        .unwrap();
    let previous = thread::bind_current(Some(Arc::clone(&proc)));
    let out = f(&proc);
    thread::bind_current(previous);
    kernel.procs().discard(&proc);
    out
}

fn trap(kernel: &Kernel, num: i64, args: [i64; 4]) -> TrapFrame {
    let mut tf = TrapFrame::syscall(num, args);
    tf.epc = 0x0040_0100;
    syscall(kernel, &mut tf);
    tf
}

#[test]
fn test_success_clears_a3_and_advances_epc() {
    let rig = Rig::new();
    as_process(&rig.kernel, |proc| {
        let tf = trap(&rig.kernel, SYS_GETPID, [0; 4]);
        assert_eq!(tf.v0, proc.pid() as i64);
        assert_eq!(tf.a3, 0);
        assert_eq!(tf.epc, 0x0040_0100 + INSN_SIZE);
        assert!(!tf.failed());
    });
}

#[test]
fn test_failure_sets_a3_and_errno() {
    let rig = Rig::new();
    as_process(&rig.kernel, |_| {
        let tf = trap(&rig.kernel, SYS_CLOSE, [42, 0, 0, 0]);
        assert!(tf.failed());
        assert_eq!(tf.a3, 1);
        assert_eq!(tf.v0, Errno::BadF.code() as i64);
        assert_eq!(tf.epc, 0x0040_0100 + INSN_SIZE);
    });
}

#[test]
fn test_unknown_and_unimplemented_calls_are_enosys() {
    let rig = Rig::new();
    as_process(&rig.kernel, |_| {
        for num in [999, -1, SYS_VFORK] {
            let tf = trap(&rig.kernel, num, [0; 4]);
            assert!(tf.failed(), "syscall {} succeeded", num);
            assert_eq!(tf.v0, Errno::NoSys.code() as i64);
        }
    });
    assert_eq!(name(SYS_VFORK), "vfork");
    assert_eq!(name(999), "unknown");
}

#[test]
fn test_bad_path_pointers_fault_before_any_copy() {
    let rig = Rig::new();
    as_process(&rig.kernel, |_| {
        for ptr in [0u32, INVALID_PTR, KERNEL_PTR] {
            for num in [SYS_OPEN, SYS_CHDIR, SYS_MKDIR] {
                let tf = trap(&rig.kernel, num, [ptr as i64, O_RDONLY as i64, 0, 0]);
                assert_eq!(
                    (tf.a3, tf.v0),
                    (1, Errno::Fault.code() as i64),
                    "{} with {:#x}",
                    name(num),
                    ptr
                );
            }
        }
    });
}

struct Uptime;

impl SyscallHandler for Uptime {
    fn handle(&self, _kernel: &Kernel, tf: &TrapFrame) -> Option<SysResult<i64>> {
        match tf.v0 {
            113 => Some(Ok(tf.a0 * 2)),
            SYS_GETPID => Some(Err(Errno::Perm)),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        "uptime"
    }
}

#[test]
fn test_custom_handler_registry() {
    minikern::try_init_tracing();
    let registry = SyscallHandlerRegistry::standard().register(Arc::new(Uptime));
    let kernel = KernelBuilder::new()
        .with_config(KernelConfig::constrained())
        .with_syscalls(registry)
        .build()
        .unwrap();
    assert_eq!(kernel.syscalls().handler_count(), 4);

    as_process(&kernel, |proc| {
        let tf = trap(&kernel, 113, [21, 0, 0, 0]);
        assert_eq!((tf.a3, tf.v0), (0, 42));

        // standard handlers come first
        let tf = trap(&kernel, SYS_GETPID, [0; 4]);
        assert_eq!((tf.a3, tf.v0), (0, proc.pid() as i64));
    });
}
