/*!
 * Condition Variables
 *
 * Used together with a `Lock`. `wait` releases the lock and suspends while
 * the CV's internal spinlock is held continuously, so a `signal` issued by
 * the next lock holder cannot be lost. The lock is re-acquired before `wait`
 * returns. While a CV has waiters it is bound to their lock; using it with a
 * different lock is a fatal error.
 */

use super::lock::LockGuard;
use super::spinlock::Spinlock;
use super::wchan::{WaitChannel, WakeResult};
use crate::{kassert, thread};
use std::fmt;

#[derive(Debug, Default)]
struct CvState {
    /// Address of the lock the current waiters released
    bound: Option<usize>,
    waiters: usize,
}

/// Condition variable
pub struct Cv {
    name: String,
    state: Spinlock<CvState>,
    wchan: WaitChannel,
}

fn lock_addr<T: ?Sized>(guard: &LockGuard<'_, T>) -> usize {
    guard.lock() as *const _ as *const () as usize
}

impl Cv {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            wchan: WaitChannel::new(name.clone()),
            state: Spinlock::new("cv state", CvState::default()),
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Release the guard's lock, sleep until signalled, then re-acquire.
    ///
    /// Wakeups may be spurious; callers re-check their condition in a loop.
    pub fn wait<T: ?Sized>(&self, guard: &mut LockGuard<'_, T>) {
        let lock = guard.lock();
        kassert!(
            !thread::in_interrupt(),
            "cv {}: wait in interrupt context",
            self.name
        );
        kassert!(
            lock.do_i_hold(),
            "cv {}: wait without holding lock {}",
            self.name,
            lock.name()
        );

        let addr = lock_addr(guard);
        let mut state = self.state.lock();
        self.check_binding(&state, addr, lock.name());
        state.bound = Some(addr);
        state.waiters += 1;

        lock.release_raw();
        self.wchan.sleep(&mut state);

        state.waiters -= 1;
        if state.waiters == 0 {
            state.bound = None;
        }
        drop(state);

        lock.acquire_raw();
    }

    /// Wake one waiter
    pub fn signal<T: ?Sized>(&self, guard: &LockGuard<'_, T>) -> WakeResult {
        let state = self.checked_state(guard);
        self.wchan.wake_one(&state)
    }

    /// Wake every waiter
    pub fn broadcast<T: ?Sized>(&self, guard: &LockGuard<'_, T>) -> WakeResult {
        let state = self.checked_state(guard);
        self.wchan.wake_all(&state)
    }

    fn checked_state<T: ?Sized>(
        &self,
        guard: &LockGuard<'_, T>,
    ) -> crate::core::sync::SpinlockGuard<'_, CvState> {
        let lock = guard.lock();
        kassert!(
            lock.do_i_hold(),
            "cv {}: signal without holding lock {}",
            self.name,
            lock.name()
        );
        let state = self.state.lock();
        self.check_binding(&state, lock_addr(guard), lock.name());
        state
    }

    fn check_binding(&self, state: &CvState, addr: usize, lock_name: &str) {
        if let Some(bound) = state.bound {
            kassert!(
                bound == addr,
                "cv {}: used with lock {} while waiters hold another lock",
                self.name,
                lock_name
            );
        }
    }
}

impl fmt::Debug for Cv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cv")
            .field("name", &self.name)
            .field("waiters", &self.state.lock().waiters)
            .finish()
    }
}
