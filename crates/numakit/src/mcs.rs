//! L2: the MCS queue lock.
//!
//! A C implementation can rely on the waiter allocating its node on the
//! stack for the duration of the critical section. Rust has no
//! equivalent raw stack discipline to lean on, so the node lives inline
//! in a scoped guard ([`McsGuard`]) that releases on `Drop`.

use std::hint;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

/// A waiter's queue node. Must outlive its critical section; in this
/// rendition that's enforced by [`McsLock::lock`] holding it inline in
/// the returned [`McsGuard`] rather than requiring the caller to manage
/// it separately.
struct Node {
    next: AtomicPtr<Node>,
    locked: AtomicBool,
}

impl Node {
    fn new() -> Self {
        Self { next: AtomicPtr::new(ptr::null_mut()), locked: AtomicBool::new(true) }
    }
}

/// A fair, FIFO mutual-exclusion lock in which each waiter spins on a
/// line in its own cache rather than on a shared tail pointer, so
/// contention does not bounce cache lines across sockets.
pub struct McsLock {
    tail: AtomicPtr<Node>,
}

impl Default for McsLock {
    fn default() -> Self {
        Self::new()
    }
}

impl McsLock {
    /// Creates an unlocked lock.
    pub fn new() -> Self {
        Self { tail: AtomicPtr::new(ptr::null_mut()) }
    }

    /// Acquires the lock, spinning (with CPU-relaxation hints) until it is
    /// held. Returns a guard that releases the lock on `Drop`.
    pub fn lock(&self) -> McsGuard<'_> {
        // `node` is boxed so its address is stable for the lifetime of
        // the critical section even though `McsGuard` itself may be
        // moved — a stack-allocated node wouldn't survive the guard
        // being returned from this function.
        let mut node = Box::new(Node::new());
        let node_ptr: *mut Node = &mut *node;

        let prev = self.tail.swap(node_ptr, Ordering::AcqRel);
        if !prev.is_null() {
            // SAFETY: `prev` was a valid node published by a predecessor
            // still inside `lock`/`unlock`; it remains valid until it
            // clears our `locked` flag below, at which point we no longer
            // touch it.
            unsafe { (*prev).next.store(node_ptr, Ordering::Release) };
            while node.locked.load(Ordering::Acquire) {
                hint::spin_loop();
            }
        }

        McsGuard { lock: self, node }
    }
}

/// RAII guard returned by [`McsLock::lock`]; releases the lock when
/// dropped.
pub struct McsGuard<'a> {
    lock: &'a McsLock,
    node: Box<Node>,
}

impl Drop for McsGuard<'_> {
    fn drop(&mut self) {
        let self_ptr: *mut Node = &mut *self.node;
        let next = self.node.next.load(Ordering::Acquire);

        if next.is_null() {
            if self
                .lock
                .tail
                .compare_exchange(self_ptr, ptr::null_mut(), Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return; // no successor, queue now empty
            }
            // A successor is mid-enqueue; wait for it to publish `next`.
            loop {
                let next = self.node.next.load(Ordering::Acquire);
                if !next.is_null() {
                    // SAFETY: `next` points at a node whose owner is
                    // spinning on `locked` inside `lock`, waiting for us.
                    unsafe { (*next).locked.store(false, Ordering::Release) };
                    return;
                }
                hint::spin_loop();
            }
        }

        // SAFETY: `next` was published by a successor that is spinning on
        // its own `locked` field inside `lock`.
        unsafe { (*next).locked.store(false, Ordering::Release) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    struct UnsyncCounter(std::cell::UnsafeCell<u64>);
    unsafe impl Send for UnsyncCounter {}
    unsafe impl Sync for UnsyncCounter {}

    #[test]
    fn scenario_mcs_mutual_exclusion() {
        // 8 threads x 100_000 increments on a plain (non-atomic) counter
        // guarded entirely by the MCS lock.
        let lock = Arc::new(McsLock::new());
        let counter = Arc::new(UnsyncCounter(std::cell::UnsafeCell::new(0)));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..100_000 {
                        let _guard = lock.lock();
                        unsafe { *counter.0.get() += 1 };
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        unsafe { assert_eq!(*counter.0.get(), 800_000) };
    }

    #[test]
    fn fifo_order_among_waiters() {
        // Simplified fairness check: two threads queue in a known order;
        // the first to register acquires first.
        let lock = Arc::new(McsLock::new());
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let g0 = lock.lock(); // main thread holds the lock first

        let lock2 = Arc::clone(&lock);
        let order2 = Arc::clone(&order);
        let t = thread::spawn(move || {
            let _g = lock2.lock();
            order2.lock().unwrap().push(1);
        });

        // Give the spawned thread a chance to register behind us.
        thread::sleep(std::time::Duration::from_millis(20));
        order.lock().unwrap().push(0);
        drop(g0);
        t.join().unwrap();

        assert_eq!(*order.lock().unwrap(), vec![0, 1]);
    }
}
