//! Integration coverage for the MCS lock under heavier contention than
//! the unit tests exercise: many threads, a shared mutable counter, and
//! an explicit check that every waiter is released exactly once.

use numakit::McsLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

#[test]
fn many_threads_each_acquire_exactly_their_share() {
    const THREADS: u64 = 16;
    const PER_THREAD: u64 = 20_000;

    let lock = Arc::new(McsLock::new());
    let counter = Arc::new(AtomicU64::new(0));
    let acquisitions = Arc::new(AtomicU64::new(0));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let lock = Arc::clone(&lock);
            let counter = Arc::clone(&counter);
            let acquisitions = Arc::clone(&acquisitions);
            thread::spawn(move || {
                for _ in 0..PER_THREAD {
                    let _guard = lock.lock();
                    counter.fetch_add(1, Ordering::Relaxed);
                    acquisitions.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(counter.load(Ordering::Relaxed), THREADS * PER_THREAD);
    assert_eq!(acquisitions.load(Ordering::Relaxed), THREADS * PER_THREAD);
}

#[test]
fn lock_is_reusable_after_every_waiter_releases() {
    let lock = Arc::new(McsLock::new());
    for round in 0..1000u32 {
        let g = lock.lock();
        drop(g);
        let _ = round;
    }
    // A fresh acquisition after many release cycles must still succeed
    // immediately (no stuck successor pointer left behind).
    let _g = lock.lock();
}
