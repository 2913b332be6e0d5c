/*!
 * Sleep Lock
 *
 * Mutual exclusion lock whose waiters sleep on a wait channel. The lock owns
 * the data it protects; access goes through a `LockGuard`, and dropping the
 * guard releases the lock. Ownership is tracked per kernel thread so misuse
 * (re-entrant acquire, release by a non-owner) is caught as a fatal error.
 */

use super::spinlock::Spinlock;
use super::wchan::WaitChannel;
use crate::kassert;
use crate::thread::{self, ThreadId};
use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

/// Sleeping lock protecting a `T`
pub struct Lock<T: ?Sized = ()> {
    name: String,
    holder: Spinlock<Option<ThreadId>>,
    wchan: WaitChannel,
    data: UnsafeCell<T>,
}

// SAFETY: `data` is only reachable through a `LockGuard`, and at most one
// guard exists at a time because `holder` admits a single owner.
unsafe impl<T: ?Sized + Send> Send for Lock<T> {}
unsafe impl<T: ?Sized + Send> Sync for Lock<T> {}

impl<T> Lock<T> {
    pub fn new(name: impl Into<String>, data: T) -> Self {
        let name = name.into();
        Self {
            wchan: WaitChannel::new(name.clone()),
            holder: Spinlock::new("lock holder", None),
            data: UnsafeCell::new(data),
            name,
        }
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> Lock<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Acquire, sleeping while another thread holds the lock
    pub fn acquire(&self) -> LockGuard<'_, T> {
        self.acquire_raw();
        LockGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    /// Acquire only if the lock is free right now
    pub fn try_acquire(&self) -> Option<LockGuard<'_, T>> {
        let me = thread::current_id();
        let mut holder = self.holder.lock();
        kassert!(
            *holder != Some(me),
            "lock {}: re-entrant acquire by {}",
            self.name,
            me
        );
        if holder.is_some() {
            return None;
        }
        *holder = Some(me);
        Some(LockGuard {
            lock: self,
            _not_send: PhantomData,
        })
    }

    /// Whether the calling thread is the owner
    pub fn do_i_hold(&self) -> bool {
        *self.holder.lock() == Some(thread::current_id())
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    pub(crate) fn acquire_raw(&self) {
        let me = thread::current_id();
        kassert!(
            !thread::in_interrupt(),
            "lock {}: acquire in interrupt context",
            self.name
        );
        let mut holder = self.holder.lock();
        kassert!(
            *holder != Some(me),
            "lock {}: re-entrant acquire by {}",
            self.name,
            me
        );
        while holder.is_some() {
            self.wchan.sleep(&mut holder);
        }
        *holder = Some(me);
    }

    pub(crate) fn release_raw(&self) {
        let me = thread::current_id();
        let mut holder = self.holder.lock();
        kassert!(
            *holder == Some(me),
            "lock {}: released by {} but held by {:?}",
            self.name,
            me,
            *holder
        );
        *holder = None;
        self.wchan.wake_one(&holder);
    }
}

impl<T: ?Sized> fmt::Debug for Lock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lock")
            .field("name", &self.name)
            .field("holder", &*self.holder.lock())
            .finish_non_exhaustive()
    }
}

/// Proof of ownership of a [`Lock`]. Released on drop by the acquiring thread.
#[must_use = "dropping the guard releases the lock immediately"]
pub struct LockGuard<'a, T: ?Sized> {
    lock: &'a Lock<T>,
    _not_send: PhantomData<*const ()>,
}

impl<'a, T: ?Sized> LockGuard<'a, T> {
    /// The lock this guard belongs to
    pub fn lock(&self) -> &'a Lock<T> {
        self.lock
    }
}

impl<T: ?Sized> Deref for LockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard's existence means this thread owns the lock.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for LockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as above, and `&mut self` makes the borrow unique.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for LockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release_raw();
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for LockGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}
