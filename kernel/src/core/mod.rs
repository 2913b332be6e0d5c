/*!
 * Core Module
 * Fundamental kernel types, limits, configuration, errors and synchronization
 */

pub mod config;
pub mod errors;
pub mod limits;
pub mod sync;
pub mod types;

// Re-export for convenience
pub use config::{ExitNotification, KernelConfig};
pub use errors::*;
pub use types::*;

/// Fatal kernel assertion.
///
/// Invariant violations are not request failures: they are logged at error
/// level and then halt the calling thread with a `kernel panic:` message.
#[macro_export]
macro_rules! kassert {
    ($cond:expr $(,)?) => {
        $crate::kassert!($cond, "assertion failed: {}", stringify!($cond))
    };
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            $crate::kpanic!($($arg)+);
        }
    };
}

/// Halt on an unrecoverable kernel error
#[macro_export]
macro_rules! kpanic {
    ($($arg:tt)+) => {{
        let message = format!($($arg)+);
        ::tracing::error!(target: "minikern::panic", "{}", message);
        panic!("kernel panic: {}", message)
    }};
}
