/*!
 * Counting Semaphore
 */

use super::spinlock::Spinlock;
use super::wchan::WaitChannel;
use crate::{kassert, kpanic, thread};
use std::fmt;

/// Counting semaphore. `p` blocks while the count is zero.
pub struct Semaphore {
    name: String,
    count: Spinlock<u32>,
    wchan: WaitChannel,
}

impl Semaphore {
    pub fn new(name: impl Into<String>, initial: u32) -> Self {
        let name = name.into();
        Self {
            wchan: WaitChannel::new(name.clone()),
            count: Spinlock::new("sem count", initial),
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decrement, sleeping until the count is positive
    pub fn p(&self) {
        kassert!(
            !thread::in_interrupt(),
            "semaphore {}: P in interrupt context",
            self.name
        );
        let mut count = self.count.lock();
        while *count == 0 {
            self.wchan.sleep(&mut count);
        }
        *count -= 1;
    }

    /// Decrement if that can be done without sleeping
    pub fn try_p(&self) -> bool {
        let mut count = self.count.lock();
        if *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }

    /// Increment and wake one sleeper
    pub fn v(&self) {
        let mut count = self.count.lock();
        *count = match count.checked_add(1) {
            Some(next) => next,
            None => kpanic!("semaphore {}: count overflow", self.name),
        };
        self.wchan.wake_one(&count);
    }

    /// Current count, for diagnostics only
    pub fn count(&self) -> u32 {
        *self.count.lock()
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semaphore")
            .field("name", &self.name)
            .field("count", &self.count())
            .finish()
    }
}
