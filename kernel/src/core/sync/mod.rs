/*!
 * Synchronization Primitives
 *
 * Blocking primitives for kernel threads, layered over two substrate pieces:
 * - `Spinlock`: short critical sections, never held across a suspend
 * - `WaitChannel`: named sleep queue that atomically drops and re-takes a
 *   spinlock around the suspend
 *
 * On top of them:
 * - `Semaphore`: counting semaphore (P/V)
 * - `Lock<T>`: sleeping mutual exclusion lock that owns its data
 * - `Cv`: condition variable used together with a `Lock`
 *
 * Wakeups are "one, in unspecified order". Every blocking path loops on its
 * condition, so a wake is never taken as proof the condition holds.
 */

mod cv;
mod lock;
mod semaphore;
mod spinlock;
mod wchan;

pub use cv::Cv;
pub use lock::{Lock, LockGuard};
pub use semaphore::Semaphore;
pub use spinlock::{Spinlock, SpinlockGuard};
pub use wchan::{WaitChannel, WakeResult};
