/*!
 * Spinlock
 *
 * Short-critical-section mutex. Callers must not block while holding one,
 * except through `WaitChannel::sleep`, which releases it for the duration.
 */

use parking_lot::{Mutex, MutexGuard};
use std::fmt;

/// Guard returned by [`Spinlock::lock`]
pub type SpinlockGuard<'a, T> = MutexGuard<'a, T>;

/// Named spinlock protecting a `T`
pub struct Spinlock<T: ?Sized> {
    name: &'static str,
    inner: Mutex<T>,
}

impl<T> Spinlock<T> {
    pub const fn new(name: &'static str, value: T) -> Self {
        Self {
            name,
            inner: Mutex::new(value),
        }
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T: ?Sized> Spinlock<T> {
    #[inline]
    pub fn lock(&self) -> SpinlockGuard<'_, T> {
        self.inner.lock()
    }

    #[inline]
    pub fn try_lock(&self) -> Option<SpinlockGuard<'_, T>> {
        self.inner.try_lock()
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Spinlock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Spinlock");
        d.field("name", &self.name);
        match self.inner.try_lock() {
            Some(guard) => d.field("data", &&*guard),
            None => d.field("data", &format_args!("<locked>")),
        };
        d.finish()
    }
}
