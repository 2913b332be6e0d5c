/*!
 * File Syscall Tests
 * open/close/read/write/lseek/dup2/fstat and the working directory calls
 */

use crate::common::{Probe, Rig};
use minikern::core::limits::*;
use minikern::syscalls::callno::{SYS_READ, SYS_WRITE};
use pretty_assertions::assert_eq;

#[test]
fn test_open_argument_errors() {
    let rig = Rig::new();
    rig.fs.create_file("/tmp/exists", b"x").unwrap();
    let probe = Probe::new();
    let p = probe.clone();
    rig.run("opener", move |ctx| {
        p.record("bad_flags", ctx.open("/tmp/a", 0x400, 0));
        p.record("bad_mode", ctx.open("/tmp/a", O_ACCMODE, 0));
        p.record("empty", ctx.open("", O_RDONLY, 0));
        p.record("missing", ctx.open("/tmp/missing", O_RDONLY, 0));
        p.record("missing_parent", ctx.open("/nope/file", O_CREAT | O_WRONLY, 0o644));
        p.record("exclusive", ctx.open("/tmp/exists", O_CREAT | O_EXCL | O_WRONLY, 0o644));
        p.record("dir_write", ctx.open("/tmp", O_WRONLY, 0));
        p.record("dir_read", ctx.open("/tmp", O_RDONLY, 0));
        0
    });

    probe.expect("bad_flags", "Err(Inval)");
    probe.expect("bad_mode", "Err(Inval)");
    probe.expect("empty", "Err(Inval)");
    probe.expect("missing", "Err(NoEnt)");
    probe.expect("missing_parent", "Err(NoEnt)");
    probe.expect("exclusive", "Err(Exist)");
    probe.expect("dir_write", "Err(IsDir)");
    probe.expect("dir_read", "Ok(3)");
    rig.assert_quiescent();
}

#[test]
fn test_read_write_and_access_modes() {
    let rig = Rig::new();
    let probe = Probe::new();
    let p = probe.clone();
    rig.run("rw", move |ctx| {
        let wfd = ctx.open("/tmp/notes", O_CREAT | O_WRONLY | O_TRUNC, 0o644).unwrap();
        p.record("write", ctx.write(wfd, b"hello world"));
        p.record("read_wo", ctx.read(wfd, 4));
        ctx.close(wfd).unwrap();

        let rfd = ctx.open("/tmp/notes", O_RDONLY, 0).unwrap();
        p.record("reused_fd", rfd == wfd);
        p.record("first", ctx.read(rfd, 5).map(String::from_utf8));
        p.record("rest", ctx.read(rfd, 64).map(String::from_utf8));
        p.record("eof", ctx.read(rfd, 64));
        p.record("write_ro", ctx.write(rfd, b"x"));
        p.record("close", ctx.close(rfd));
        p.record("close_again", ctx.close(rfd));
        p.record("read_closed", ctx.read(rfd, 1));
        p.record("negative", ctx.write(-1, b"x"));
        p.record("too_high", ctx.write(OPEN_MAX_PROBE, b"x"));
        0
    });

    probe.expect("write", "Ok(11)");
    probe.expect("read_wo", "Err(BadF)");
    probe.expect("reused_fd", "true");
    probe.expect("first", r#"Ok(Ok("hello"))"#);
    probe.expect("rest", r#"Ok(Ok(" world"))"#);
    probe.expect("eof", "Ok([])");
    probe.expect("write_ro", "Err(BadF)");
    probe.expect("close", "Ok(())");
    probe.expect("close_again", "Err(BadF)");
    probe.expect("read_closed", "Err(BadF)");
    probe.expect("negative", "Err(BadF)");
    probe.expect("too_high", "Err(BadF)");
    assert_eq!(rig.fs.read_file("/tmp/notes").unwrap(), b"hello world");
    rig.assert_quiescent();
}

const OPEN_MAX_PROBE: i32 = 1000;

/// Between the heap and the stack, never mapped
const UNMAPPED: i64 = 0x2000_0000;

#[test]
fn test_append_mode_starts_at_end() {
    let rig = Rig::new();
    rig.fs.create_file("/tmp/log", b"one\n").unwrap();
    rig.run("appender", |ctx| {
        let fd = ctx.open("/tmp/log", O_WRONLY | O_APPEND, 0).unwrap();
        ctx.write(fd, b"two\n").unwrap();
        ctx.write(fd, b"three\n").unwrap();
        0
    });
    assert_eq!(rig.fs.read_file("/tmp/log").unwrap(), b"one\ntwo\nthree\n");
    rig.assert_quiescent();
}

#[test]
fn test_console_streams_and_fallback() {
    let rig = Rig::new();
    rig.console.push_input(b"typed");
    let probe = Probe::new();
    let p = probe.clone();
    rig.run("console", move |ctx| {
        p.record("stdout", ctx.write(STDOUT_FILENO, b"out "));
        p.record("stderr", ctx.write(STDERR_FILENO, b"err "));
        p.record("read_stdout", ctx.read(STDOUT_FILENO, 4));
        p.record("write_stdin", ctx.write(STDIN_FILENO, b"x"));

        // closed standard streams still reach the console
        ctx.close(STDOUT_FILENO).unwrap();
        ctx.close(STDIN_FILENO).unwrap();
        p.record("fallback_write", ctx.write(STDOUT_FILENO, b"fallback"));
        p.record("fallback_read", ctx.read(STDIN_FILENO, 16).map(String::from_utf8));
        p.record("fallback_read_stdout", ctx.read(STDOUT_FILENO, 1));
        0
    });

    probe.expect("stdout", "Ok(4)");
    probe.expect("stderr", "Ok(4)");
    probe.expect("read_stdout", "Err(BadF)");
    probe.expect("write_stdin", "Err(BadF)");
    probe.expect("fallback_write", "Ok(8)");
    probe.expect("fallback_read", r#"Ok(Ok("typed"))"#);
    probe.expect("fallback_read_stdout", "Err(Inval)");
    assert_eq!(rig.console.output_string(), "out err fallback");
    rig.assert_quiescent();
}

#[test]
fn test_lseek_rules() {
    let rig = Rig::new();
    rig.fs.create_file("/tmp/data", b"0123456789").unwrap();
    let probe = Probe::new();
    let p = probe.clone();
    rig.run("seeker", move |ctx| {
        let fd = ctx.open("/tmp/data", O_RDONLY, 0).unwrap();
        p.record("set", ctx.lseek(fd, 4, SEEK_SET));
        p.record("cur", ctx.lseek(fd, 2, SEEK_CUR));
        p.record("read", ctx.read(fd, 2));
        p.record("end", ctx.lseek(fd, -3, SEEK_END));
        p.record("past_end", ctx.lseek(fd, 100, SEEK_SET));
        p.record("negative", ctx.lseek(fd, -1, SEEK_SET));
        p.record("after_negative", ctx.lseek(fd, 0, SEEK_CUR));
        p.record("bad_whence", ctx.lseek(fd, 0, 7));
        p.record("large", ctx.lseek(fd, 1 << 40, SEEK_SET));
        p.record("stdin", ctx.lseek(STDIN_FILENO, 0, SEEK_SET));
        p.record("console", ctx.lseek(STDOUT_FILENO, 0, SEEK_SET));
        p.record("closed", ctx.lseek(9, 0, SEEK_SET));
        p.record("close_stdin", ctx.close(STDIN_FILENO));
        p.record("closed_stdin", ctx.lseek(STDIN_FILENO, 0, SEEK_SET));
        0
    });

    probe.expect("set", "Ok(4)");
    probe.expect("cur", "Ok(6)");
    probe.expect("read", "Ok([54, 55])");
    probe.expect("end", "Ok(7)");
    probe.expect("past_end", "Ok(100)");
    probe.expect("negative", "Err(Inval)");
    probe.expect("after_negative", "Ok(100)");
    probe.expect("bad_whence", "Err(Inval)");
    probe.expect("large", "Ok(1099511627776)");
    probe.expect("stdin", "Err(Inval)");
    probe.expect("console", "Err(SPipe)");
    probe.expect("closed", "Err(BadF)");
    probe.expect("close_stdin", "Ok(())");
    probe.expect("closed_stdin", "Err(Inval)");
    rig.assert_quiescent();
}

#[test]
fn test_fstat_reports_size_and_refuses_standard_streams() {
    let rig = Rig::new();
    rig.fs.create_file("/tmp/sized", &[7u8; 300]).unwrap();
    let probe = Probe::new();
    let p = probe.clone();
    rig.run("stat", move |ctx| {
        let fd = ctx.open("/tmp/sized", O_RDONLY, 0).unwrap();
        p.record("size", ctx.fstat(fd).map(|s| (s.size, s.is_dir())));
        let dir = ctx.open("/tmp", O_RDONLY, 0).unwrap();
        p.record("dir", ctx.fstat(dir).map(|s| s.is_dir()));
        for std in 0..3 {
            p.record("std", ctx.fstat(std));
        }
        p.record("bad", ctx.fstat(12));
        p.record("close_stdout", ctx.close(STDOUT_FILENO));
        p.record("closed_stdout", ctx.fstat(STDOUT_FILENO));
        0
    });

    probe.expect("size", "Ok((300, false))");
    probe.expect("dir", "Ok(true)");
    assert_eq!(probe.all("std"), vec!["Err(NoSys)"; 3]);
    probe.expect("bad", "Err(BadF)");
    probe.expect("close_stdout", "Ok(())");
    probe.expect("closed_stdout", "Err(NoSys)");
    rig.assert_quiescent();
}

#[test]
fn test_dup2_redirects_stdout_into_file() {
    let rig = Rig::new();
    let probe = Probe::new();
    let p = probe.clone();
    rig.run("redirect", move |ctx| {
        let fd = ctx.open("/tmp/out", O_CREAT | O_WRONLY, 0o644).unwrap();
        p.record("dup", ctx.dup2(fd, STDOUT_FILENO));
        p.record("same", ctx.dup2(fd, fd));
        ctx.close(fd).unwrap();
        ctx.write(STDOUT_FILENO, b"redirected").unwrap();
        p.record("bad_old", ctx.dup2(11, 4));
        p.record("bad_new", ctx.dup2(STDOUT_FILENO, -2));
        p.record("high_new", ctx.dup2(STDOUT_FILENO, 5000));
        0
    });

    probe.expect("dup", "Ok(1)");
    probe.expect("same", "Ok(3)");
    probe.expect("bad_old", "Err(BadF)");
    probe.expect("bad_new", "Err(BadF)");
    probe.expect("high_new", "Err(BadF)");
    assert_eq!(rig.fs.read_file("/tmp/out").unwrap(), b"redirected");
    assert_eq!(rig.console.output_string(), "");
    rig.assert_quiescent();
}

#[test]
fn test_descriptor_table_fills_at_open_max() {
    let rig = Rig::new();
    rig.fs.create_file("/tmp/many", b"").unwrap();
    let open_max = rig.kernel.config().open_max;
    let probe = Probe::new();
    let p = probe.clone();
    rig.run("hoarder", move |ctx| {
        let mut fds = Vec::new();
        loop {
            match ctx.open("/tmp/many", O_RDONLY, 0) {
                Ok(fd) => fds.push(fd),
                Err(e) => {
                    p.record("error", e);
                    break;
                }
            }
        }
        p.record("opened", fds.len());
        p.record("last", fds.last().copied());
        0
    });

    probe.expect("error", "MFile");
    probe.expect("opened", &(open_max - 3).to_string());
    probe.expect("last", &format!("Some({})", open_max - 1));
    rig.assert_quiescent();
}

#[test]
fn test_user_buffers_are_checked() {
    let rig = Rig::new();
    rig.fs.create_file("/tmp/src", b"abcdef").unwrap();
    let probe = Probe::new();
    let p = probe.clone();
    rig.run("faulty", move |ctx| {
        let fd = ctx.open("/tmp/src", O_RDONLY, 0).unwrap();
        p.record("kernel_buf", ctx.syscall(SYS_READ, [fd as i64, KERNEL_PTR as i64, 4, 0]));
        p.record("invalid", ctx.syscall(SYS_READ, [fd as i64, INVALID_PTR as i64, 4, 0]));
        p.record("unmapped", ctx.syscall(SYS_READ, [fd as i64, UNMAPPED, 4, 0]));
        let edge = ctx.alloc(2).unwrap();
        p.record("straddle", ctx.syscall(SYS_READ, [fd as i64, edge.addr() as i64, 1 << 20, 0]));
        p.record("null_write", ctx.syscall(SYS_WRITE, [1, 0, 4, 0]));
        // a failed copy leaves the offset where it was
        p.record("offset", ctx.lseek(fd, 0, SEEK_CUR));
        0
    });

    probe.expect("kernel_buf", "Err(Fault)");
    probe.expect("invalid", "Err(Fault)");
    probe.expect("unmapped", "Err(Fault)");
    probe.expect("straddle", "Err(Fault)");
    probe.expect("null_write", "Err(Fault)");
    probe.expect("offset", "Ok(0)");
    rig.assert_quiescent();
}

#[test]
fn test_working_directory_calls() {
    let rig = Rig::new();
    rig.fs.create_file("/tmp/plain", b"").unwrap();
    let probe = Probe::new();
    let p = probe.clone();
    rig.run("walker", move |ctx| {
        p.record("initial", ctx.getcwd());
        p.record("mkdir", ctx.mkdir("/tmp/proj", 0o755));
        p.record("mkdir_again", ctx.mkdir("/tmp/proj", 0o755));
        p.record("mkdir_orphan", ctx.mkdir("/none/sub", 0o755));
        p.record("chdir", ctx.chdir("/tmp/proj"));
        p.record("cwd", ctx.getcwd());

        let fd = ctx.open("notes", O_CREAT | O_WRONLY, 0o644).unwrap();
        ctx.write(fd, b"relative").unwrap();
        ctx.close(fd).unwrap();

        p.record("chdir_up", ctx.chdir(".."));
        p.record("cwd_up", ctx.getcwd());
        p.record("chdir_file", ctx.chdir("/tmp/plain"));
        p.record("chdir_slashes", ctx.chdir("/tmp//proj"));
        p.record("chdir_missing", ctx.chdir("/tmp/ghost"));
        p.record("chdir_empty", ctx.chdir(""));
        p.record("cwd_final", ctx.getcwd());
        0
    });

    probe.expect("initial", r#"Ok("/")"#);
    probe.expect("mkdir", "Ok(())");
    probe.expect("mkdir_again", "Err(Exist)");
    probe.expect("mkdir_orphan", "Err(NoEnt)");
    probe.expect("chdir", "Ok(())");
    probe.expect("cwd", r#"Ok("/tmp/proj")"#);
    probe.expect("chdir_up", "Ok(())");
    probe.expect("cwd_up", r#"Ok("/tmp")"#);
    probe.expect("chdir_file", "Err(NotDir)");
    probe.expect("chdir_slashes", "Err(NotDir)");
    probe.expect("chdir_missing", "Err(NoEnt)");
    probe.expect("chdir_empty", "Err(Inval)");
    probe.expect("cwd_final", r#"Ok("/tmp")"#);
    assert_eq!(rig.fs.read_file("/tmp/proj/notes").unwrap(), b"relative");
    rig.assert_quiescent();
}

#[test]
fn test_getcwd_truncates_to_buffer() {
    let rig = Rig::new();
    let probe = Probe::new();
    let p = probe.clone();
    rig.run("short", move |ctx| {
        ctx.chdir("/tmp").unwrap();
        let buf = ctx.alloc(3).unwrap();
        let n = ctx.syscall(minikern::syscalls::callno::SYS_GETCWD, [buf.addr() as i64, 3, 0, 0]);
        p.record("n", n);
        p.record("bytes", ctx.peek(buf, 3).map(String::from_utf8));
        0
    });
    probe.expect("n", "Ok(3)");
    probe.expect("bytes", r#"Ok(Ok("/tm"))"#);
    rig.assert_quiescent();
}
