//! L3: the writer-preferring reader-writer spinlock.

use crate::invariants::debug_assert_rw_exclusion;
use std::hint;
use std::sync::atomic::{AtomicU32, Ordering};

const WRITER_ACTIVE: u32 = 1 << 0;
const WRITER_WAITING: u32 = 1 << 1;
const READER_INCR: u32 = 1 << 2;
const READER_MASK: u32 = !(WRITER_ACTIVE | WRITER_WAITING);

/// A spinlock whose single 32-bit state word packs `writer_active` (bit
/// 0), `writer_waiting` (bit 1), and `reader_count` (bits 2+).
///
/// Writer-preferring: once a writer announces intent (`writer_waiting`),
/// no new reader may enter, though readers already in the critical
/// section may still exit — this bounds writer starvation under a steady
/// stream of new readers without requiring a ticket/queue discipline.
pub struct RwSpinlock {
    state: AtomicU32,
}

impl Default for RwSpinlock {
    fn default() -> Self {
        Self::new()
    }
}

impl RwSpinlock {
    /// Creates an unlocked lock.
    pub fn new() -> Self {
        Self { state: AtomicU32::new(0) }
    }

    /// Acquires a shared read lock, spinning while a writer is active or
    /// waiting.
    pub fn read_lock(&self) -> RwReadGuard<'_> {
        loop {
            let state = self.state.load(Ordering::Relaxed);
            if state & (WRITER_ACTIVE | WRITER_WAITING) != 0 {
                hint::spin_loop();
                continue;
            }
            if self
                .state
                .compare_exchange_weak(state, state + READER_INCR, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return RwReadGuard { lock: self };
            }
        }
    }

    /// Acquires the exclusive write lock. Sets `writer_waiting` first so
    /// no further readers can enter, then spins until the last existing
    /// reader drains.
    pub fn write_lock(&self) -> RwWriteGuard<'_> {
        self.state.fetch_or(WRITER_WAITING, Ordering::Relaxed);

        loop {
            let state = self.state.load(Ordering::Relaxed);
            if (state & READER_MASK) == 0 && (state & WRITER_ACTIVE) == 0 {
                let desired = (state & !WRITER_WAITING) | WRITER_ACTIVE;
                if self.state.compare_exchange_weak(state, desired, Ordering::Acquire, Ordering::Relaxed).is_ok() {
                    debug_assert_rw_exclusion!(self.state.load(Ordering::Relaxed), WRITER_ACTIVE, READER_MASK);
                    return RwWriteGuard { lock: self };
                }
            }
            hint::spin_loop();
        }
    }

    /// Samples the raw state word. Intended for tests that need to
    /// observe exclusion directly.
    pub fn raw_state(&self) -> u32 {
        self.state.load(Ordering::Acquire)
    }
}

/// RAII guard for a held read lock.
pub struct RwReadGuard<'a> {
    lock: &'a RwSpinlock,
}

impl Drop for RwReadGuard<'_> {
    fn drop(&mut self) {
        self.lock.state.fetch_sub(READER_INCR, Ordering::Release);
    }
}

/// RAII guard for a held write lock.
pub struct RwWriteGuard<'a> {
    lock: &'a RwSpinlock,
}

impl Drop for RwWriteGuard<'_> {
    fn drop(&mut self) {
        self.lock.state.fetch_and(!WRITER_ACTIVE, Ordering::Release);
    }
}
