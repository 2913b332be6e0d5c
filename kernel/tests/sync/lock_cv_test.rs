/*!
 * Lock and Condition Variable Integration Tests
 */

use minikern::{Cv, Lock};
use pretty_assertions::assert_eq;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;

#[test]
fn test_lock_serializes_increments() {
    let counter = Arc::new(Lock::new("counter", 0u64));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                for _ in 0..1000 {
                    let mut guard = counter.acquire();
                    let seen = *guard;
                    thread::yield_now();
                    *guard = seen + 1;
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(*counter.acquire(), 8000);
}

#[test]
fn test_do_i_hold_is_per_thread() {
    let lock = Arc::new(Lock::new("owner", ()));
    let guard = lock.acquire();
    assert!(lock.do_i_hold());

    let other = Arc::clone(&lock);
    let seen_elsewhere = thread::spawn(move || other.do_i_hold()).join().unwrap();
    assert!(!seen_elsewhere);

    drop(guard);
    assert!(!lock.do_i_hold());
}

struct Buffer {
    items: VecDeque<u32>,
    capacity: usize,
}

#[test]
fn test_bounded_buffer_with_two_cvs() {
    let buffer = Arc::new(Lock::new(
        "buffer",
        Buffer {
            items: VecDeque::new(),
            capacity: 4,
        },
    ));
    let not_full = Arc::new(Cv::new("not full"));
    let not_empty = Arc::new(Cv::new("not empty"));

    let producer = {
        let (buffer, not_full, not_empty) =
            (Arc::clone(&buffer), Arc::clone(&not_full), Arc::clone(&not_empty));
        thread::spawn(move || {
            for i in 0..500 {
                let mut guard = buffer.acquire();
                while guard.items.len() == guard.capacity {
                    not_full.wait(&mut guard);
                }
                guard.items.push_back(i);
                not_empty.signal(&guard);
            }
        })
    };

    let consumer = {
        let (buffer, not_full, not_empty) =
            (Arc::clone(&buffer), Arc::clone(&not_full), Arc::clone(&not_empty));
        thread::spawn(move || {
            let mut received = Vec::with_capacity(500);
            while received.len() < 500 {
                let mut guard = buffer.acquire();
                while guard.items.is_empty() {
                    not_empty.wait(&mut guard);
                }
                received.push(guard.items.pop_front().unwrap());
                not_full.signal(&guard);
            }
            received
        })
    };

    producer.join().unwrap();
    let received = consumer.join().unwrap();
    assert_eq!(received, (0..500).collect::<Vec<_>>());
}

#[test]
fn test_broadcast_releases_every_waiter() {
    let state = Arc::new(Lock::new("gate", false));
    let cv = Arc::new(Cv::new("gate"));
    let arrived = Arc::new(Lock::new("arrived", 0usize));
    let arrived_cv = Arc::new(Cv::new("arrived"));

    let waiters: Vec<_> = (0..6)
        .map(|_| {
            let (state, cv) = (Arc::clone(&state), Arc::clone(&cv));
            let (arrived, arrived_cv) = (Arc::clone(&arrived), Arc::clone(&arrived_cv));
            thread::spawn(move || {
                let mut open = state.acquire();
                {
                    let mut count = arrived.acquire();
                    *count += 1;
                    arrived_cv.signal(&count);
                }
                while !*open {
                    cv.wait(&mut open);
                }
            })
        })
        .collect();

    {
        let mut count = arrived.acquire();
        while *count < 6 {
            arrived_cv.wait(&mut count);
        }
    }

    let mut open = state.acquire();
    *open = true;
    cv.broadcast(&open);
    drop(open);

    for waiter in waiters {
        waiter.join().unwrap();
    }
}

#[test]
fn test_signal_without_waiters_is_harmless() {
    let lock = Lock::new("idle", ());
    let cv = Cv::new("idle");
    let guard = lock.acquire();
    assert!(!cv.signal(&guard).is_woken());
    assert!(!cv.broadcast(&guard).is_woken());
}
