/*!
 * execv Integration Tests
 */

use crate::common::{Probe, Rig};
use minikern::core::limits::{O_CREAT, O_WRONLY};
use minikern::KernelConfig;
use pretty_assertions::assert_eq;

fn install_target(rig: &Rig, probe: &Probe) {
    let p = probe.clone();
    rig.kernel
        .install_program("/bin/target", move |ctx| {
            p.record("target_args", ctx.args());
            p.record("target_pid", ctx.getpid());
            33
        })
        .unwrap();
}

#[test]
fn test_execv_replaces_program_and_passes_args() {
    let rig = Rig::new();
    let probe = Probe::new();
    install_target(&rig, &probe);

    let p = probe.clone();
    rig.run("launcher", move |ctx| {
        let pid = ctx
            .fork(|child| {
                let err = child.execv("/bin/target", &["target", "alpha", "beta"]);
                100 + err.code()
            })
            .unwrap();
        p.record("child", pid);
        p.record("status", ctx.waitpid(pid, 0).map(|(_, s)| s));
        0
    });

    probe.expect("target_args", r#"Ok(["target", "alpha", "beta"])"#);
    let child = probe.get("child").unwrap();
    probe.expect("target_pid", &format!("Ok({})", child));
    probe.expect("status", "Ok(33)");
    rig.assert_quiescent();
}

#[test]
fn test_execv_with_empty_argv() {
    let rig = Rig::new();
    let probe = Probe::new();
    install_target(&rig, &probe);

    let status = rig.run("bare", |ctx| 100 + ctx.execv("/bin/target", &[]).code());
    assert_eq!(status, 33);
    probe.expect("target_args", "Ok([])");
    rig.assert_quiescent();
}

#[test]
fn test_execv_failures_leave_caller_running() {
    let rig = Rig::new();
    rig.fs.create_file("/tmp/data", b"plain text").unwrap();
    rig.fs.create_file("/tmp/ghost", b"\x7fSIM/bin/ghost").unwrap();
    let budget = budget_of(&rig);

    let probe = Probe::new();
    let p = probe.clone();
    let status = rig.run("survivor", move |ctx| {
        let cell = ctx.alloc(4).unwrap();
        ctx.poke_u32(cell, 0xfeed).unwrap();
        let before = budget.used();

        p.record("missing", ctx.execv("/bin/missing", &["missing"]));
        p.record("not_exec", ctx.execv("/tmp/data", &["data"]));
        p.record("unregistered", ctx.execv("/tmp/ghost", &["ghost"]));
        p.record("directory", ctx.execv("/tmp", &["tmp"]));
        p.record("empty_path", ctx.execv("", &["x"]));

        let many: Vec<String> = (0..9).map(|i| format!("arg{}", i)).collect();
        let many: Vec<&str> = many.iter().map(String::as_str).collect();
        p.record("too_many", ctx.execv("/bin/survivor", &many));

        let long = "x".repeat(2048);
        p.record("too_long", ctx.execv("/bin/survivor", &[long.as_str()]));

        p.record("pages_unchanged", budget.used() == before);
        p.record("memory_intact", ctx.peek_u32(cell));
        p.record("still_writes", ctx.write(1, b"still here\n"));
        0
    });

    assert_eq!(status, 0);
    probe.expect("missing", "NoEnt");
    probe.expect("not_exec", "NoExec");
    probe.expect("unregistered", "NoExec");
    probe.expect("directory", "IsDir");
    probe.expect("empty_path", "Inval");
    probe.expect("too_many", "TooBig");
    probe.expect("too_long", "TooBig");
    probe.expect("pages_unchanged", "true");
    probe.expect("memory_intact", "Ok(65261)");
    probe.expect("still_writes", "Ok(11)");
    assert!(rig.console.output_string().contains("still here"));
    rig.assert_quiescent();
}

fn budget_of(rig: &Rig) -> std::sync::Arc<minikern::mm::PageBudget> {
    std::sync::Arc::clone(rig.kernel.budget())
}

#[test]
fn test_execv_out_of_memory_rolls_back() {
    let config = KernelConfig {
        user_pages: 12,
        stack_pages: 4,
        heap_pages: 4,
        ..KernelConfig::constrained()
    };
    let rig = Rig::with_config(config);
    let probe = Probe::new();
    install_target(&rig, &probe);
    let budget = budget_of(&rig);

    let p = probe.clone();
    let status = rig.run("hungry", move |ctx| {
        let before = budget.used();
        p.record("exec", ctx.execv("/bin/target", &["target"]));
        p.record("pages_unchanged", budget.used() == before);
        5
    });

    assert_eq!(status, 5);
    probe.expect("exec", "NoMem");
    probe.expect("pages_unchanged", "true");
    assert_eq!(probe.get("target_args"), None);
    rig.assert_quiescent();
}

#[test]
fn test_execv_resets_standard_streams() {
    let rig = Rig::new();
    rig.kernel
        .install_program("/bin/speaker", |ctx| {
            ctx.write(1, b"after\n").unwrap();
            0
        })
        .unwrap();

    let status = rig.run("redirector", |ctx| {
        let fd = ctx.open("/tmp/redirect", O_CREAT | O_WRONLY, 0o644).unwrap();
        ctx.dup2(fd, 1).unwrap();
        ctx.close(fd).unwrap();
        ctx.write(1, b"before\n").unwrap();
        100 + ctx.execv("/bin/speaker", &["speaker"]).code()
    });

    assert_eq!(status, 0);
    assert_eq!(rig.fs.read_file("/tmp/redirect").unwrap(), b"before\n");
    assert_eq!(rig.console.output_string(), "after\n");
    rig.assert_quiescent();
}

#[test]
fn test_execv_keeps_working_directory_and_resolves_relative_paths() {
    let rig = Rig::new();
    let probe = Probe::new();
    let p = probe.clone();
    rig.kernel
        .install_program("/bin/pwd", move |ctx| {
            p.record("cwd", ctx.getcwd());
            0
        })
        .unwrap();

    let status = rig.run("mover", |ctx| {
        ctx.mkdir("/tmp/work", 0o755).unwrap();
        ctx.chdir("/tmp/work").unwrap();
        100 + ctx.execv("../../bin/pwd", &["pwd"]).code()
    });

    assert_eq!(status, 0);
    probe.expect("cwd", r#"Ok("/tmp/work")"#);
    rig.assert_quiescent();
}
