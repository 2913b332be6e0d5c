/*!
 * Process Types
 * Lifecycle state and exit notification
 */

use crate::core::config::ExitNotification;
use crate::core::sync::{Cv, Lock, Semaphore};
use serde::{Deserialize, Serialize};

/// Process lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// Running or runnable
    Running,
    /// Exited, waiting to be reaped
    Zombie,
    /// Removed from the process table
    Reaped,
}

#[derive(Debug, Default)]
struct ExitRecord {
    exited: bool,
    status: i32,
}

#[derive(Debug)]
enum Notifier {
    Condvar(Cv),
    Semaphore(Semaphore),
}

/// Exit flag, status byte and the mechanism that wakes a waiting parent.
///
/// The flag and status live under one `Lock`; the waiter checks the flag and
/// suspends without ever letting go of that lock in between, so an exit that
/// lands between the two cannot be missed.
#[derive(Debug)]
pub struct ExitStatus {
    record: Lock<ExitRecord>,
    notifier: Notifier,
}

impl ExitStatus {
    pub fn new(name: &str, kind: ExitNotification) -> Self {
        let notifier = match kind {
            ExitNotification::Condvar => Notifier::Condvar(Cv::new(format!("{} exit", name))),
            ExitNotification::Semaphore => {
                Notifier::Semaphore(Semaphore::new(format!("{} exit", name), 0))
            }
        };
        Self {
            record: Lock::new(format!("{} exit", name), ExitRecord::default()),
            notifier,
        }
    }

    /// Record `status & 0xff`, mark exited and wake the waiter
    pub fn publish(&self, status: i32) {
        let mut record = self.record.acquire();
        record.status = status & 0xff;
        record.exited = true;
        match &self.notifier {
            Notifier::Condvar(cv) => {
                cv.broadcast(&record);
            }
            Notifier::Semaphore(sem) => {
                drop(record);
                sem.v();
            }
        }
    }

    /// Block until exit has been published, then return the status
    pub fn wait(&self) -> i32 {
        match &self.notifier {
            Notifier::Condvar(cv) => {
                let mut record = self.record.acquire();
                while !record.exited {
                    cv.wait(&mut record);
                }
                record.status
            }
            Notifier::Semaphore(sem) => {
                if let Some(status) = self.status() {
                    return status;
                }
                sem.p();
                let record = self.record.acquire();
                crate::kassert!(record.exited, "exit semaphore posted before exit");
                record.status
            }
        }
    }

    pub fn has_exited(&self) -> bool {
        self.record.acquire().exited
    }

    /// Status if exit has been published
    pub fn status(&self) -> Option<i32> {
        let record = self.record.acquire();
        record.exited.then_some(record.status)
    }
}
