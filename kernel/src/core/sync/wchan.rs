/*!
 * Wait Channels
 *
 * A wait channel is a named sleep queue tied to the spinlock its callers
 * hold. `sleep` releases that spinlock and suspends in one step, so a waker
 * that takes the same spinlock cannot slip in between the caller's check and
 * its suspend.
 */

use super::spinlock::SpinlockGuard;
use crate::kassert;
use crate::thread;
use parking_lot::Condvar;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Result of a wake operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeResult {
    /// Woke N sleepers (N >= 1)
    Woken(usize),
    /// Nobody was sleeping
    NoWaiters,
}

impl WakeResult {
    #[inline(always)]
    pub fn is_woken(&self) -> bool {
        matches!(self, WakeResult::Woken(_))
    }

    #[inline(always)]
    pub fn count(&self) -> usize {
        match self {
            WakeResult::Woken(n) => *n,
            WakeResult::NoWaiters => 0,
        }
    }
}

/// Named sleep queue
pub struct WaitChannel {
    name: String,
    cond: Condvar,
    sleepers: AtomicUsize,
}

impl WaitChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cond: Condvar::new(),
            sleepers: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Suspend the caller, releasing `guard` while asleep.
    ///
    /// The spinlock is held again on return. Returning does not imply the
    /// caller's condition is true.
    pub fn sleep<T: ?Sized>(&self, guard: &mut SpinlockGuard<'_, T>) {
        kassert!(
            !thread::in_interrupt(),
            "wchan {}: sleep in interrupt context",
            self.name
        );
        self.sleepers.fetch_add(1, Ordering::Relaxed);
        self.cond.wait(guard);
        self.sleepers.fetch_sub(1, Ordering::Relaxed);
    }

    /// Wake one sleeper, chosen in no particular order
    pub fn wake_one<T: ?Sized>(&self, _held: &SpinlockGuard<'_, T>) -> WakeResult {
        if self.cond.notify_one() {
            WakeResult::Woken(1)
        } else {
            WakeResult::NoWaiters
        }
    }

    /// Wake every sleeper
    pub fn wake_all<T: ?Sized>(&self, _held: &SpinlockGuard<'_, T>) -> WakeResult {
        match self.cond.notify_all() {
            0 => WakeResult::NoWaiters,
            n => WakeResult::Woken(n),
        }
    }
}

impl fmt::Debug for WaitChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitChannel")
            .field("name", &self.name)
            .field("sleepers", &self.sleepers.load(Ordering::Relaxed))
            .finish()
    }
}
