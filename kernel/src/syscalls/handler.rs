/*!
 * Syscall Handler Trait
 * Defines the interface for syscall handlers and handler registration
 */

use crate::core::types::SysResult;
use crate::kernel::Kernel;
use crate::machine::TrapFrame;
use std::sync::Arc;

/// Trait for handling one family of syscalls
/// Each category (file, current directory, process) implements this
pub trait SyscallHandler: Send + Sync {
    /// Handle the call in `tf`, or `None` if the number is not ours.
    ///
    /// `Ok(v)` lands in v0 with a3 cleared; `Err(e)` puts the errno in v0
    /// and sets a3.
    fn handle(&self, kernel: &Kernel, tf: &TrapFrame) -> Option<SysResult<i64>>;

    /// Get the name of this handler (for logging/debugging)
    fn name(&self) -> &'static str;
}

/// Registry for syscall handlers
/// Dispatches syscalls to the first handler that claims the number
#[derive(Clone)]
pub struct SyscallHandlerRegistry {
    handlers: Arc<Vec<Arc<dyn SyscallHandler>>>,
}

impl SyscallHandlerRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Registry with every handler the kernel ships
    pub fn standard() -> Self {
        Self::new()
            .register(Arc::new(super::file::FileHandler))
            .register(Arc::new(super::curdir::CurdirHandler))
            .register(Arc::new(super::process::ProcessHandler))
    }

    /// Register a handler in the registry
    pub fn register(mut self, handler: Arc<dyn SyscallHandler>) -> Self {
        let handlers = Arc::make_mut(&mut self.handlers);
        handlers.push(handler);
        self
    }

    /// Dispatch a syscall to the appropriate handler
    /// Returns None if no handler can handle this syscall
    pub fn dispatch(&self, kernel: &Kernel, tf: &TrapFrame) -> Option<SysResult<i64>> {
        self.handlers
            .iter()
            .find_map(|handler| handler.handle(kernel, tf))
    }

    /// Get the number of registered handlers
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl Default for SyscallHandlerRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
