/*!
 * Kernel Handle
 *
 * Owns every shared subsystem: the process table, the VFS, the system-wide
 * open-file pool, the user page budget, the program registry and the
 * syscall handler registry. `Kernel` is a cheap clone of one shared state;
 * each kernel thread carries its own clone.
 */

mod builder;

pub use builder::KernelBuilder;

use crate::core::config::KernelConfig;
use crate::core::errors::{Errno, KernelError};
use crate::core::types::{KernelResult, Pid, UserPtr};
use crate::file::{start_stdio, OpenFilePool};
use crate::machine::{enter_new_process, executable_image, ProgramRegistry, UserCtx, UserProgram};
use crate::mm::PageBudget;
use crate::process::{Process, ProcessTable};
use crate::syscalls::exec::{close_program, load_image, LoadedImage};
use crate::syscalls::{ArgBlock, SyscallHandlerRegistry};
use crate::thread;
use crate::vfs::{OpenFlags, Vfs, VfsError};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

struct KernelInner {
    config: KernelConfig,
    procs: ProcessTable,
    vfs: Vfs,
    pool: Arc<OpenFilePool>,
    budget: Arc<PageBudget>,
    programs: ProgramRegistry,
    syscalls: SyscallHandlerRegistry,
    kproc: Arc<Process>,
}

/// Shared handle to a booted kernel
#[derive(Clone)]
pub struct Kernel {
    inner: Arc<KernelInner>,
}

impl Kernel {
    /// Create a new kernel builder
    pub fn builder() -> KernelBuilder {
        KernelBuilder::new()
    }

    pub fn config(&self) -> &KernelConfig {
        &self.inner.config
    }

    pub fn procs(&self) -> &ProcessTable {
        &self.inner.procs
    }

    pub fn vfs(&self) -> &Vfs {
        &self.inner.vfs
    }

    pub fn pool(&self) -> &Arc<OpenFilePool> {
        &self.inner.pool
    }

    pub fn budget(&self) -> &Arc<PageBudget> {
        &self.inner.budget
    }

    pub fn programs(&self) -> &ProgramRegistry {
        &self.inner.programs
    }

    pub fn syscalls(&self) -> &SyscallHandlerRegistry {
        &self.inner.syscalls
    }

    /// Process zero, parent of every process started by `runprogram`
    pub fn kernel_process(&self) -> &Arc<Process> {
        &self.inner.kproc
    }

    /// Write an executable for `program` at `path` and register its body
    pub fn install_program<F>(&self, path: &str, program: F) -> KernelResult<()>
    where
        F: Fn(&mut UserCtx) -> i32 + Send + Sync + 'static,
    {
        self.install_shared(path, Arc::new(program))
    }

    fn install_shared(&self, path: &str, program: UserProgram) -> KernelResult<()> {
        let root = self.vfs().root();
        let resolved = Vfs::resolve("/", path);
        if let Some(parent) = resolved.parent() {
            let mut dir = Path::new("/").to_path_buf();
            for part in parent.components().skip(1) {
                dir.push(part);
                match root.mkdir(&dir, 0o755) {
                    Ok(()) | Err(VfsError::AlreadyExists(_)) => {}
                    Err(e) => return Err(Errno::from(e).into()),
                }
            }
        }

        let name = resolved.to_string_lossy().into_owned();
        let flags = OpenFlags::write_only().with_create().with_truncate();
        let vnode = root.open(&resolved, flags, 0o755).map_err(Errno::from)?;
        let written = vnode.write_at(0, &executable_image(&name));
        let closed = vnode.close();
        written.map_err(Errno::from)?;
        closed.map_err(Errno::from)?;

        self.programs().insert(&name, program);
        debug!(program = %name, "program installed");
        Ok(())
    }

    /// Start the program at `path` as a new child of the kernel process,
    /// the way the boot menu does. Returns once the process is running.
    ///
    /// The program is loaded before any process exists, so a bad path or
    /// image fails here without leaving anything behind.
    pub fn runprogram<S: AsRef<str>>(&self, path: &str, args: &[S]) -> KernelResult<Pid> {
        let config = self.config();
        if args.len() > config.max_exec_args {
            return Err(Errno::TooBig.into());
        }
        let block = ArgBlock::marshal(args, config.arg_max)?;

        let kproc = self.kernel_process();
        let vnode = self
            .vfs()
            .open(&kproc.cwd(), path, OpenFlags::read_only(), 0)
            .map_err(Errno::from)?;
        let loaded = load_image(self, &vnode, &block);
        close_program(&vnode, path);
        let LoadedImage { mut space, entry, argv } = loaded?;

        let name = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string());
        let child = self.procs().alloc_child(
            kproc,
            &name,
            config.open_max,
            config.exit_notification,
        )?;

        if let Err(e) = start_stdio(child.files(), self.vfs(), self.pool()) {
            self.abandon(&child);
            return Err(e.into());
        }
        space.activate();
        child.replace_addrspace(Some(space));
        child.set_cwd(kproc.cwd());

        let kernel = self.clone();
        let argc = block.argc();
        let thread_name = format!("{}[{}]", name, child.pid());
        let spawned = thread::thread_fork(&thread_name, Some(Arc::clone(&child)), move || {
            enter_new_process(&kernel, argc, UserPtr(argv), argv, entry);
        });
        match spawned {
            Ok(_detached) => {
                info!(pid = child.pid(), program = path, argc, "program started");
                Ok(child.pid())
            }
            Err(e) => {
                self.abandon(&child);
                Err(KernelError::Thread(e.to_string()))
            }
        }
    }

    /// Tear down a child that never ran
    fn abandon(&self, child: &Process) {
        if let Err(e) = child.files().close_all() {
            warn!(pid = child.pid(), error = %e, "closing descriptors of abandoned child failed");
        }
        drop(child.replace_addrspace(None));
        self.procs().discard(child);
    }

    /// Block until `pid`, a process started by `runprogram`, exits; reap it
    /// and return its status
    pub fn wait(&self, pid: Pid) -> KernelResult<i32> {
        let child = self.procs().waitable_child(self.kernel_process(), pid)?;
        let status = child.exit_status().wait();
        self.procs().reap(&child);
        debug!(pid, status, "kernel reaped process");
        Ok(status)
    }

    /// `runprogram` followed by `wait`
    pub fn run_and_wait<S: AsRef<str>>(&self, path: &str, args: &[S]) -> KernelResult<i32> {
        let pid = self.runprogram(path, args)?;
        self.wait(pid)
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("live_procs", &self.procs().live_count())
            .field("open_files", &self.pool().in_use())
            .field("pages_used", &self.budget().used())
            .finish()
    }
}
