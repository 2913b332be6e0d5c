/*!
 * Kernel Builder
 * Builder pattern for Kernel construction
 */

use super::{Kernel, KernelInner};
use crate::core::config::KernelConfig;
use crate::core::types::KernelResult;
use crate::file::OpenFilePool;
use crate::machine::{ProgramRegistry, UserCtx, UserProgram};
use crate::mm::PageBudget;
use crate::process::ProcessTable;
use crate::syscalls::SyscallHandlerRegistry;
use crate::vfs::{Console, FileSystem, MemFs, StdioConsole, Vfs};
use std::sync::Arc;
use tracing::info;

/// Builder for Kernel
pub struct KernelBuilder {
    config: KernelConfig,
    root: Option<Arc<dyn FileSystem>>,
    console: Option<Arc<dyn Console>>,
    syscalls: Option<SyscallHandlerRegistry>,
    programs: Vec<(String, UserProgram)>,
}

impl KernelBuilder {
    /// Create a new Kernel builder
    pub fn new() -> Self {
        Self {
            config: KernelConfig::default(),
            root: None,
            console: None,
            syscalls: None,
            programs: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: KernelConfig) -> Self {
        self.config = config;
        self
    }

    /// Root filesystem (defaults to an empty `MemFs`)
    pub fn with_filesystem(mut self, root: Arc<dyn FileSystem>) -> Self {
        self.root = Some(root);
        self
    }

    /// Console behind `con:` (defaults to the host's stdin/stdout)
    pub fn with_console(mut self, console: Arc<dyn Console>) -> Self {
        self.console = Some(console);
        self
    }

    /// Replace the standard syscall handler set
    pub fn with_syscalls(mut self, syscalls: SyscallHandlerRegistry) -> Self {
        self.syscalls = Some(syscalls);
        self
    }

    /// Install `program` at `path` during boot
    pub fn with_program<F>(mut self, path: &str, program: F) -> Self
    where
        F: Fn(&mut UserCtx) -> i32 + Send + Sync + 'static,
    {
        self.programs.push((path.to_string(), Arc::new(program)));
        self
    }

    /// Build the kernel
    pub fn build(self) -> KernelResult<Kernel> {
        let config = self.config;
        config.validate()?;

        let root = self.root.unwrap_or_else(|| Arc::new(MemFs::new()));
        let console = self.console.unwrap_or_else(|| Arc::new(StdioConsole));
        let vfs = Vfs::new(root, console);

        let procs = ProcessTable::new(config.max_procs);
        let kproc = procs.bootstrap_kernel(config.open_max);

        let kernel = Kernel {
            inner: Arc::new(KernelInner {
                pool: OpenFilePool::new(config.system_open_max),
                budget: PageBudget::new(config.user_pages),
                programs: ProgramRegistry::new(),
                syscalls: self.syscalls.unwrap_or_default(),
                config,
                procs,
                vfs,
                kproc,
            }),
        };

        for (path, program) in self.programs {
            kernel.install_shared(&path, program)?;
        }

        info!(
            max_procs = kernel.config().max_procs,
            open_max = kernel.config().open_max,
            user_pages = kernel.config().user_pages,
            exit_notification = ?kernel.config().exit_notification,
            handlers = kernel.syscalls().handler_count(),
            "kernel booted"
        );
        Ok(kernel)
    }
}

impl Default for KernelBuilder {
    fn default() -> Self {
        Self::new()
    }
}
