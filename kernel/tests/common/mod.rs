/*!
 * Shared fixtures for the integration tests
 */

#![allow(dead_code)]

use minikern::{BufferConsole, ExitNotification, Kernel, KernelConfig, MemFs};
use parking_lot::Mutex;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A booted kernel plus handles on its console and root filesystem
pub struct Rig {
    pub kernel: Kernel,
    pub console: Arc<BufferConsole>,
    pub fs: MemFs,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_config(KernelConfig::constrained())
    }

    pub fn with_notification(notification: ExitNotification) -> Self {
        Self::with_config(KernelConfig {
            exit_notification: notification,
            ..KernelConfig::constrained()
        })
    }

    pub fn with_config(config: KernelConfig) -> Self {
        minikern::try_init_tracing();
        let console = BufferConsole::new();
        let fs = MemFs::new();
        fs.create_dir_all("/tmp").unwrap();
        let kernel = Kernel::builder()
            .with_config(config)
            .with_console(console.clone())
            .with_filesystem(Arc::new(fs.clone()))
            .build()
            .unwrap();
        Self { kernel, console, fs }
    }

    /// Install `program` at `/bin/<name>`, run it and return its status
    pub fn run<F>(&self, name: &str, program: F) -> i32
    where
        F: Fn(&mut minikern::UserCtx) -> i32 + Send + Sync + 'static,
    {
        let path = format!("/bin/{}", name);
        self.kernel.install_program(&path, program).unwrap();
        self.kernel.run_and_wait(&path, &[name]).unwrap()
    }

    /// Wait until every user process is gone and all of their resources
    /// have been returned
    pub fn assert_quiescent(&self) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.kernel.procs().live_count() > 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(self.kernel.procs().live_count(), 0, "processes left behind");
        assert_eq!(self.kernel.pool().in_use(), 0, "open files leaked");
        assert_eq!(self.kernel.budget().used(), 0, "user pages leaked");
    }
}

/// Observations reported from inside user programs.
///
/// User code runs on kernel threads where a failed assertion would kill
/// the thread without an exit, so programs record what they saw and the
/// test asserts afterwards.
#[derive(Clone, Default)]
pub struct Probe(Arc<Mutex<Vec<(String, String)>>>);

impl Probe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, key: &str, value: impl Debug) {
        self.0.lock().push((key.to_string(), format!("{:?}", value)));
    }

    /// Last value recorded under `key`
    pub fn get(&self, key: &str) -> Option<String> {
        self.0
            .lock()
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    pub fn all(&self, key: &str) -> Vec<String> {
        self.0
            .lock()
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .collect()
    }

    /// Poll for `key` from another user thread, giving up after a while
    pub fn wait_for(&self, key: &str) -> Option<String> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(value) = self.get(key) {
                return Some(value);
            }
            if Instant::now() > deadline {
                return None;
            }
            std::thread::yield_now();
        }
    }

    #[track_caller]
    pub fn expect(&self, key: &str, value: &str) {
        pretty_assertions::assert_eq!(self.get(key).as_deref(), Some(value), "probe key {}", key);
    }
}
