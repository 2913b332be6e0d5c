/*!
 * fork / waitpid / _exit Integration Tests
 */

use crate::common::{Probe, Rig};
use minikern::core::limits::{KERNEL_PID, O_CREAT, O_WRONLY, WNOHANG};
use minikern::syscalls::callno::SYS_WAITPID;
use minikern::{ExitNotification, KernelConfig, Semaphore};
use pretty_assertions::assert_eq;
use rand::Rng;
use serial_test::serial;
use std::sync::Arc;

fn fork_and_collect(rig: &Rig) -> Probe {
    let probe = Probe::new();
    let p = probe.clone();
    let status = rig.run("forker", move |ctx| {
        let child_probe = p.clone();
        let forked = ctx.fork(move |child| {
            child_probe.record("child_pid", child.getpid());
            7
        });
        match forked {
            Ok(pid) => {
                p.record("fork", pid);
                p.record("wait", ctx.waitpid(pid, 0));
                0
            }
            Err(e) => {
                p.record("fork", e);
                1
            }
        }
    });
    assert_eq!(status, 0);
    probe
}

#[test]
fn test_fork_returns_child_pid_and_status() {
    let rig = Rig::new();
    let probe = fork_and_collect(&rig);
    let pid = probe.get("fork").unwrap();
    probe.expect("child_pid", &format!("Ok({})", pid));
    probe.expect("wait", &format!("Ok(({}, 7))", pid));
    rig.assert_quiescent();
}

#[test]
fn test_fork_wait_with_semaphore_notification() {
    let rig = Rig::with_notification(ExitNotification::Semaphore);
    let probe = fork_and_collect(&rig);
    let pid = probe.get("fork").unwrap();
    probe.expect("wait", &format!("Ok(({}, 7))", pid));
    rig.assert_quiescent();
}

#[test]
fn test_child_gets_private_copy_of_memory() {
    let rig = Rig::new();
    let probe = Probe::new();
    let p = probe.clone();
    rig.run("cow", move |ctx| {
        let cell = ctx.alloc(4).unwrap();
        ctx.poke_u32(cell, 1).unwrap();
        let child_probe = p.clone();
        let pid = ctx
            .fork(move |child| {
                child.poke_u32(cell, 99).unwrap();
                child_probe.record("child_sees", child.peek_u32(cell));
                0
            })
            .unwrap();
        ctx.waitpid(pid, 0).unwrap();
        p.record("parent_sees", ctx.peek_u32(cell));
        0
    });
    probe.expect("child_sees", "Ok(99)");
    probe.expect("parent_sees", "Ok(1)");
    rig.assert_quiescent();
}

#[test]
fn test_fork_shares_open_file_offsets() {
    let rig = Rig::new();
    let status = rig.run("sharer", |ctx| {
        let fd = ctx.open("/tmp/shared", O_CREAT | O_WRONLY, 0o644).unwrap();
        let pid = ctx
            .fork(move |child| {
                child.write(fd, b"child").unwrap();
                0
            })
            .unwrap();
        ctx.waitpid(pid, 0).unwrap();
        ctx.write(fd, b"parent").unwrap();
        ctx.close(fd).unwrap();
        0
    });
    assert_eq!(status, 0);
    assert_eq!(rig.fs.read_file("/tmp/shared").unwrap(), b"childparent");
    rig.assert_quiescent();
}

#[test]
#[serial]
fn test_fork_stops_at_process_cap() {
    let rig = Rig::new();
    let cap = rig.kernel.config().max_procs;
    let gate = Arc::new(Semaphore::new("gate", 0));
    let probe = Probe::new();

    let (p, g) = (probe.clone(), Arc::clone(&gate));
    rig.run("spawner", move |ctx| {
        let mut children = Vec::new();
        let failure = loop {
            let child_gate = Arc::clone(&g);
            match ctx.fork(move |_| {
                child_gate.p();
                0
            }) {
                Ok(pid) => children.push(pid),
                Err(e) => break e,
            }
        };
        p.record("forked", children.len());
        p.record("failure", failure);
        for _ in &children {
            g.v();
        }
        let reaped = children
            .iter()
            .filter(|&&pid| ctx.waitpid(pid, 0).is_ok())
            .count();
        p.record("reaped", reaped);
        0
    });

    probe.expect("forked", &(cap - 1).to_string());
    probe.expect("failure", "NProc");
    probe.expect("reaped", &(cap - 1).to_string());
    rig.assert_quiescent();
}

#[test]
fn test_fork_out_of_memory_rolls_back() {
    let config = KernelConfig {
        user_pages: 12,
        stack_pages: 4,
        heap_pages: 4,
        ..KernelConfig::constrained()
    };
    let rig = Rig::with_config(config);
    let ready = Arc::new(Semaphore::new("ready", 0));
    let go = Arc::new(Semaphore::new("go", 0));
    let forked = Arc::new(Semaphore::new("forked", 0));
    let resume = Arc::new(Semaphore::new("resume", 0));
    let probe = Probe::new();

    let p = probe.clone();
    let gates = (
        Arc::clone(&ready),
        Arc::clone(&go),
        Arc::clone(&forked),
        Arc::clone(&resume),
    );
    rig.kernel
        .install_program("/bin/greedy", move |ctx| {
            let (ready, go, forked, resume) = &gates;
            ready.v();
            go.p();
            let child_probe = p.clone();
            let result = ctx.fork(move |_| {
                child_probe.record("child_ran", true);
                0
            });
            p.record("fork", result);
            forked.v();
            resume.p();
            0
        })
        .unwrap();

    let snapshot = |rig: &Rig| {
        (
            rig.kernel.procs().live_count(),
            rig.kernel.pool().in_use(),
            rig.kernel.budget().used(),
        )
    };

    let pid = rig.kernel.runprogram("/bin/greedy", &["greedy"]).unwrap();
    ready.p();
    let before = snapshot(&rig);
    go.v();
    forked.p();
    let after = snapshot(&rig);
    resume.v();
    assert_eq!(rig.kernel.wait(pid).unwrap(), 0);

    probe.expect("fork", "Err(NoMem)");
    assert_eq!(probe.get("child_ran"), None);
    assert_eq!(before.0, 1);
    assert_eq!(after, before);
    rig.assert_quiescent();
}

#[test]
fn test_waitpid_argument_errors() {
    let rig = Rig::new();
    let gate = Arc::new(Semaphore::new("gate", 0));
    let probe = Probe::new();

    let (p, g) = (probe.clone(), Arc::clone(&gate));
    rig.run("waiter", move |ctx| {
        let me = ctx.getpid().unwrap();
        p.record("self", ctx.waitpid(me, 0));
        p.record("parent", ctx.waitpid(KERNEL_PID, 0));
        p.record("zero", ctx.waitpid(0, 0));
        p.record("negative", ctx.waitpid(-5, 0));
        p.record("out_of_range", ctx.waitpid(40000, 0));
        p.record("unused", ctx.waitpid(30000, 0));

        let child_gate = Arc::clone(&g);
        let child = ctx
            .fork(move |_| {
                child_gate.p();
                3
            })
            .unwrap();
        p.record("bad_options", ctx.waitpid(child, 5));
        p.record("nohang", ctx.waitpid(child, WNOHANG));
        p.record(
            "kernel_status_ptr",
            ctx.syscall(SYS_WAITPID, [child as i64, 0x8000_0000, 0, 0]),
        );
        let buf = ctx.alloc(8).unwrap();
        p.record(
            "misaligned_status_ptr",
            ctx.syscall(SYS_WAITPID, [child as i64, buf.addr() as i64 + 1, 0, 0]),
        );

        g.v();
        p.record("null_status", ctx.syscall(SYS_WAITPID, [child as i64, 0, 0, 0]));
        p.record("child", child);
        p.record("again", ctx.waitpid(child, 0));
        0
    });

    probe.expect("self", "Err(Perm)");
    probe.expect("parent", "Err(Perm)");
    probe.expect("zero", "Err(Srch)");
    probe.expect("negative", "Err(Srch)");
    probe.expect("out_of_range", "Err(Srch)");
    probe.expect("unused", "Err(Srch)");
    probe.expect("bad_options", "Err(Inval)");
    probe.expect("nohang", "Ok((0, 0))");
    probe.expect("kernel_status_ptr", "Err(Fault)");
    probe.expect("misaligned_status_ptr", "Err(Fault)");
    let child = probe.get("child").unwrap();
    probe.expect("null_status", &format!("Ok({})", child));
    probe.expect("again", "Err(Srch)");
    rig.assert_quiescent();
}

#[test]
fn test_waitpid_on_sibling_and_grandchild() {
    let rig = Rig::new();
    let gate = Arc::new(Semaphore::new("grandchild gate", 0));
    let probe = Probe::new();

    let (p, g) = (probe.clone(), Arc::clone(&gate));
    rig.run("family", move |ctx| {
        let (ap, ag) = (p.clone(), Arc::clone(&g));
        let a = ctx
            .fork(move |c| {
                let gg = Arc::clone(&ag);
                let grandchild = c
                    .fork(move |_| {
                        gg.p();
                        0
                    })
                    .unwrap();
                ap.record("grandchild", grandchild);
                c.waitpid(grandchild, 0).map(|(_, s)| s).unwrap_or(-1)
            })
            .unwrap();

        let bp = p.clone();
        let b = ctx
            .fork(move |c| {
                bp.record("sibling", c.waitpid(a, 0));
                0
            })
            .unwrap();
        ctx.waitpid(b, 0).unwrap();

        let grandchild: i32 = p.wait_for("grandchild").unwrap().parse().unwrap();
        p.record("grandchild_wait", ctx.waitpid(grandchild, 0));
        g.v();
        p.record("a", ctx.waitpid(a, 0).map(|(_, s)| s));
        0
    });

    probe.expect("sibling", "Err(Perm)");
    probe.expect("grandchild_wait", "Err(Child)");
    probe.expect("a", "Ok(0)");
    rig.assert_quiescent();
}

#[test]
fn test_exit_status_keeps_low_byte() {
    let rig = Rig::new();
    let probe = Probe::new();
    let p = probe.clone();
    rig.run("bytes", move |ctx| {
        let pid = ctx.fork(|_| 0x1ff).unwrap();
        p.record("status", ctx.waitpid(pid, 0).map(|(_, s)| s));
        0
    });
    probe.expect("status", "Ok(255)");
    rig.assert_quiescent();
}

#[test]
fn test_orphan_reaps_itself() {
    let rig = Rig::new();
    let gate = Arc::new(Semaphore::new("orphan gate", 0));
    let probe = Probe::new();

    let (p, g) = (probe.clone(), Arc::clone(&gate));
    let status = rig.run("abandoner", move |ctx| {
        let cp = p.clone();
        let cg = Arc::clone(&g);
        let pid = ctx
            .fork(move |child| {
                cg.p();
                cp.record("orphan_alive", child.getpid());
                0
            })
            .unwrap();
        p.record("orphan", pid);
        0
    });
    assert_eq!(status, 0);
    assert_eq!(rig.kernel.procs().live_count(), 1);

    gate.v();
    let orphan = probe.get("orphan").unwrap();
    assert_eq!(probe.wait_for("orphan_alive"), Some(format!("Ok({})", orphan)));
    rig.assert_quiescent();
}

#[test]
fn test_exited_children_are_collected_with_their_parent() {
    let rig = Rig::new();
    let probe = Probe::new();
    let p = probe.clone();
    rig.run("neglect", move |ctx| {
        for _ in 0..3 {
            let cp = p.clone();
            ctx.fork(move |child| {
                cp.record("done", child.getpid());
                0
            })
            .unwrap();
        }
        while p.all("done").len() < 3 {
            std::thread::yield_now();
        }
        0
    });
    rig.assert_quiescent();
}

#[test]
#[serial]
fn test_process_tree_statuses() {
    let rig = Rig::new();
    let statuses: Vec<i32> = {
        let mut rng = rand::thread_rng();
        (0..3).map(|_| rng.gen_range(0..100)).collect()
    };
    let expected: i32 = statuses.iter().map(|s| s + 1).sum();

    let probe = Probe::new();
    let p = probe.clone();
    rig.run("tree", move |ctx| {
        let mut total = 0;
        let mut children = Vec::new();
        for &status in &statuses {
            let pid = ctx
                .fork(move |child| {
                    let leaf = child.fork(|_| 1).unwrap();
                    let (_, leaf_status) = child.waitpid(leaf, 0).unwrap();
                    status + leaf_status
                })
                .unwrap();
            children.push(pid);
        }
        for pid in children {
            total += ctx.waitpid(pid, 0).map(|(_, s)| s).unwrap_or(-1000);
        }
        p.record("total", total);
        0
    });
    probe.expect("total", &expected.to_string());
    rig.assert_quiescent();
}
