/*!
 * Kernel Configuration
 *
 * Runtime-tunable limits. Defaults come from `core::limits`; a config can be
 * read from JSON and then overridden from the environment.
 */

use super::errors::KernelError;
use super::limits::*;
use super::types::KernelResult;
use serde::{Deserialize, Serialize};

/// How an exiting process wakes the parent blocked in waitpid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExitNotification {
    /// Lock-protected exited flag plus a condition variable
    #[default]
    Condvar,
    /// A semaphore posted once at exit and consumed by the waiter
    Semaphore,
}

impl std::str::FromStr for ExitNotification {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "condvar" | "cv" => Ok(ExitNotification::Condvar),
            "semaphore" | "sem" => Ok(ExitNotification::Semaphore),
            other => Err(KernelError::Configuration(format!(
                "unknown exit notification '{}'",
                other
            ))),
        }
    }
}

/// Kernel configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default, deny_unknown_fields)]
pub struct KernelConfig {
    /// Maximum number of live user processes
    pub max_procs: usize,
    /// Descriptor slots per process
    pub open_max: usize,
    /// Open-file objects across the whole system
    pub system_open_max: usize,
    /// Maximum argv entries accepted by execv
    pub max_exec_args: usize,
    /// Maximum marshalled argument bytes accepted by execv
    pub arg_max: usize,
    /// User pages available to all address spaces together
    pub user_pages: usize,
    /// Pages reserved for each user stack
    pub stack_pages: usize,
    /// Pages reserved for each user heap
    pub heap_pages: usize,
    /// Exit notification mechanism
    pub exit_notification: ExitNotification,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            max_procs: DEFAULT_MAX_PROCS,
            open_max: DEFAULT_OPEN_MAX,
            system_open_max: 10 * DEFAULT_OPEN_MAX,
            max_exec_args: DEFAULT_MAX_EXEC_ARGS,
            arg_max: DEFAULT_ARG_MAX,
            user_pages: DEFAULT_USER_PAGES,
            stack_pages: DEFAULT_STACK_PAGES,
            heap_pages: DEFAULT_HEAP_PAGES,
            exit_notification: ExitNotification::Condvar,
        }
    }
}

impl KernelConfig {
    /// Small limits for tests that exercise exhaustion paths
    pub fn constrained() -> Self {
        Self {
            max_procs: 8,
            open_max: 16,
            system_open_max: 64,
            max_exec_args: 8,
            arg_max: 1024,
            user_pages: 512,
            stack_pages: 4,
            heap_pages: 4,
            exit_notification: ExitNotification::Condvar,
        }
    }

    /// Parse a JSON document; missing fields keep their defaults
    pub fn from_json(json: &str) -> KernelResult<Self> {
        let config: KernelConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Default configuration with environment overrides applied
    ///
    /// Environment variables:
    /// - KERNEL_MAX_PROCS
    /// - KERNEL_OPEN_MAX
    /// - KERNEL_USER_PAGES
    /// - KERNEL_EXIT_NOTIFICATION (condvar | semaphore)
    pub fn from_env() -> KernelResult<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply environment overrides on top of this configuration
    pub fn with_env_overrides(mut self) -> KernelResult<Self> {
        if let Some(v) = env_usize("KERNEL_MAX_PROCS")? {
            self.max_procs = v;
        }
        if let Some(v) = env_usize("KERNEL_OPEN_MAX")? {
            self.open_max = v;
            self.system_open_max = self.system_open_max.max(v);
        }
        if let Some(v) = env_usize("KERNEL_USER_PAGES")? {
            self.user_pages = v;
        }
        if let Ok(v) = std::env::var("KERNEL_EXIT_NOTIFICATION") {
            self.exit_notification = v.parse()?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Reject limits the kernel cannot run with
    pub fn validate(&self) -> KernelResult<()> {
        if self.max_procs == 0 {
            return Err(KernelError::Configuration("max_procs must be positive".into()));
        }
        if self.max_procs > (PID_MAX - PID_MIN + 1) as usize {
            return Err(KernelError::Configuration(format!(
                "max_procs {} exceeds the pid range",
                self.max_procs
            )));
        }
        if self.open_max < 3 {
            return Err(KernelError::Configuration(
                "open_max must leave room for the three standard streams".into(),
            ));
        }
        if self.system_open_max < self.open_max {
            return Err(KernelError::Configuration(format!(
                "system_open_max {} is smaller than open_max {}",
                self.system_open_max, self.open_max
            )));
        }
        if self.stack_pages == 0 || self.user_pages < self.stack_pages {
            return Err(KernelError::Configuration(
                "user_pages must cover at least one stack".into(),
            ));
        }
        if self.arg_max < USER_PTR_SIZE {
            return Err(KernelError::Configuration("arg_max is too small".into()));
        }
        Ok(())
    }
}

fn env_usize(key: &str) -> KernelResult<Option<usize>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| KernelError::Configuration(format!("{}: {}", key, e))),
        Err(_) => Ok(None),
    }
}
