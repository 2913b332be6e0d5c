/*!
 * Kernel Threads
 *
 * Every host thread that runs kernel code has a `Thread` record reachable
 * through `current()`. Threads started with `thread_fork` are bound to a
 * process and end through `thread_exit`, which unwinds back to the spawn
 * trampoline and never returns to its caller.
 */

use crate::core::errors::Errno;
use crate::core::types::SysResult;
use crate::process::Process;
use parking_lot::Mutex;
use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT: RefCell<Option<Arc<Thread>>> = const { RefCell::new(None) };
}

/// Kernel thread identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(u64);

impl ThreadId {
    fn next() -> Self {
        ThreadId(NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Kernel thread record
pub struct Thread {
    id: ThreadId,
    name: String,
    in_interrupt: AtomicBool,
    process: Mutex<Option<Arc<Process>>>,
}

impl Thread {
    fn new(name: String, process: Option<Arc<Process>>) -> Self {
        Self {
            id: ThreadId::next(),
            name,
            in_interrupt: AtomicBool::new(false),
            process: Mutex::new(process),
        }
    }

    #[inline]
    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn in_interrupt(&self) -> bool {
        self.in_interrupt.load(Ordering::Acquire)
    }

    /// Process this thread runs for, if any
    pub fn process(&self) -> Option<Arc<Process>> {
        self.process.lock().clone()
    }

    pub(crate) fn set_process(&self, process: Option<Arc<Process>>) -> Option<Arc<Process>> {
        std::mem::replace(&mut *self.process.lock(), process)
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("in_interrupt", &self.in_interrupt())
            .finish()
    }
}

/// The calling thread's record, registering host threads on first use
pub fn current() -> Arc<Thread> {
    CURRENT.with(|slot| {
        let mut slot = slot.borrow_mut();
        slot.get_or_insert_with(|| {
            let name = std::thread::current()
                .name()
                .unwrap_or("host")
                .to_string();
            Arc::new(Thread::new(name, None))
        })
        .clone()
    })
}

#[inline]
pub fn current_id() -> ThreadId {
    current().id()
}

#[inline]
pub fn in_interrupt() -> bool {
    current().in_interrupt()
}

/// Process of the calling thread
pub fn curproc() -> Option<Arc<Process>> {
    current().process()
}

/// Bind the calling thread to `process`, returning the previous binding
pub fn bind_current(process: Option<Arc<Process>>) -> Option<Arc<Process>> {
    current().set_process(process)
}

/// Marks the calling thread as running in interrupt context until dropped.
///
/// Blocking primitives assert they are never entered while this is live.
pub struct InterruptGuard {
    thread: Arc<Thread>,
    previous: bool,
}

impl InterruptGuard {
    pub fn enter() -> Self {
        let thread = current();
        let previous = thread.in_interrupt.swap(true, Ordering::AcqRel);
        Self { thread, previous }
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        self.thread.in_interrupt.store(self.previous, Ordering::Release);
    }
}

/// Unwind payload carried by `thread_exit`
struct ThreadExit;

/// Start a new kernel thread bound to `process` running `entry`
pub fn thread_fork<F>(
    name: &str,
    process: Option<Arc<Process>>,
    entry: F,
) -> SysResult<std::thread::JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let thread_name = name.to_string();
    std::thread::Builder::new()
        .name(thread_name.clone())
        .spawn(move || {
            let record = Arc::new(Thread::new(thread_name, process));
            let id = record.id();
            CURRENT.with(|slot| *slot.borrow_mut() = Some(record));
            debug!(thread = %id, "kernel thread started");

            let outcome = panic::catch_unwind(AssertUnwindSafe(entry));

            CURRENT.with(|slot| {
                if let Some(thread) = slot.borrow_mut().take() {
                    thread.set_process(None);
                }
            });

            match outcome {
                Ok(()) => debug!(thread = %id, "kernel thread returned"),
                Err(payload) if payload.is::<ThreadExit>() => {
                    debug!(thread = %id, "kernel thread exited")
                }
                Err(payload) => {
                    error!(thread = %id, "kernel thread died");
                    panic::resume_unwind(payload);
                }
            }
        })
        .map_err(|e| {
            error!(error = %e, "thread creation failed");
            Errno::NoMem
        })
}

/// Terminate the calling kernel thread. Never returns.
pub fn thread_exit() -> ! {
    let thread = current();
    debug!(thread = %thread.id(), "thread_exit");
    thread.set_process(None);
    panic::resume_unwind(Box::new(ThreadExit))
}
