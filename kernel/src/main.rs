/*!
 * minikern - Main Entry Point
 *
 * Boots a kernel on the host console with a small set of built-in user
 * programs and runs one of them, like the boot menu's `p` command:
 *
 *     kernel [program [args...]]
 *
 * Without arguments `/bin/init` runs. Limits come from the environment
 * (see `KernelConfig::from_env`) or from the JSON file named by
 * KERNEL_CONFIG.
 */

use anyhow::{Context, Result};
use minikern::core::limits::{O_CREAT, O_RDWR, SEEK_SET};
use minikern::{init_tracing, Kernel, KernelBuilder, KernelConfig, UserCtx};
use tracing::info;

fn load_config() -> Result<KernelConfig> {
    match std::env::var("KERNEL_CONFIG") {
        Ok(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading kernel config {}", path))?;
            let config = KernelConfig::from_json(&json)?;
            Ok(config.with_env_overrides()?)
        }
        Err(_) => Ok(KernelConfig::from_env()?),
    }
}

fn hello(ctx: &mut UserCtx) -> i32 {
    let pid = ctx.getpid().unwrap_or(-1);
    let args = ctx.args().unwrap_or_default();
    let line = format!("hello from pid {} with args {:?}\n", pid, args);
    match ctx.write(1, line.as_bytes()) {
        Ok(_) => 0,
        Err(_) => 1,
    }
}

fn forktest(ctx: &mut UserCtx) -> i32 {
    let mut children = Vec::new();
    for i in 0..4 {
        match ctx.fork(move |child| {
            let pid = child.getpid().unwrap_or(-1);
            let _ = child.write(1, format!("  child {} is pid {}\n", i, pid).as_bytes());
            i
        }) {
            Ok(pid) => children.push(pid),
            Err(e) => {
                let _ = ctx.write(2, format!("fork failed: {}\n", e).as_bytes());
                return 1;
            }
        }
    }
    for pid in children {
        match ctx.waitpid(pid, 0) {
            Ok((reaped, status)) => {
                let _ = ctx.write(1, format!("  reaped {} status {}\n", reaped, status).as_bytes());
            }
            Err(e) => {
                let _ = ctx.write(2, format!("waitpid({}) failed: {}\n", pid, e).as_bytes());
                return 1;
            }
        }
    }
    0
}

fn filetest(ctx: &mut UserCtx) -> i32 {
    let fd = match ctx.open("/tmp/filetest", O_CREAT | O_RDWR, 0o644) {
        Ok(fd) => fd,
        Err(e) => {
            let _ = ctx.write(2, format!("open failed: {}\n", e).as_bytes());
            return 1;
        }
    };
    let ok = ctx.write(fd, b"shared offset\n").is_ok()
        && ctx.lseek(fd, 0, SEEK_SET).is_ok()
        && ctx
            .read(fd, 64)
            .map(|bytes| ctx.write(1, &bytes).is_ok())
            .unwrap_or(false);
    let _ = ctx.close(fd);
    if ok {
        0
    } else {
        1
    }
}

fn init(ctx: &mut UserCtx) -> i32 {
    let _ = ctx.write(1, b"init: starting\n");
    for program in ["/bin/hello", "/bin/forktest", "/bin/filetest"] {
        let pid = ctx.fork(move |child| {
            let err = child.execv(program, &[program, "from-init"]);
            let _ = child.write(2, format!("execv {} failed: {}\n", program, err).as_bytes());
            127
        });
        match pid {
            Ok(pid) => {
                let status = ctx.waitpid(pid, 0).map(|(_, s)| s).unwrap_or(-1);
                let _ = ctx.write(1, format!("init: {} exited with {}\n", program, status).as_bytes());
            }
            Err(e) => {
                let _ = ctx.write(2, format!("init: fork failed: {}\n", e).as_bytes());
            }
        }
    }
    0
}

fn boot(config: KernelConfig) -> Result<Kernel> {
    let kernel = KernelBuilder::new()
        .with_config(config)
        .with_program("/bin/init", init)
        .with_program("/bin/hello", hello)
        .with_program("/bin/forktest", forktest)
        .with_program("/bin/filetest", filetest)
        .build()?;
    kernel
        .vfs()
        .mkdir("/", "/tmp", 0o777)
        .map_err(|e| anyhow::anyhow!("creating /tmp: {}", e))?;
    Ok(kernel)
}

fn main() -> Result<()> {
    init_tracing();

    let config = load_config().context("loading kernel configuration")?;
    info!(?config, "minikern starting");
    let kernel = boot(config)?;

    let mut argv: Vec<String> = std::env::args().skip(1).collect();
    if argv.is_empty() {
        argv.push("/bin/init".to_string());
    }
    let program = argv[0].clone();

    let status = kernel
        .run_and_wait(&program, &argv)
        .with_context(|| format!("running {}", program))?;
    info!(program = %program, status, "program finished");
    std::process::exit(status);
}
