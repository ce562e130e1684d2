//! L1: the sequenced MPMC ring buffer, built on a Vyukov-style CAS
//! push/pop algorithm combined with a cache-line-separation idiom
//! adapted from an SPSC ring (`CacheAligned<T>` and its debug-build
//! invariant macros).
//!
//! An SPSC ring lets a single producer own `tail` and a single consumer
//! own `head`, both cached unsynchronized on the owning side. True
//! multi-producer multi-consumer semantics are required here, so both
//! `head` and `tail` are claimed via CAS rather than owned outright by
//! one side.
//!
//! Deliberate Rust-native adaptation (recorded in DESIGN.md): the control
//! block (`head`, `tail`, `capacity`, `mask`) lives as ordinary Rust
//! struct fields rather than inside the arena alongside the cell array —
//! Rust's ownership model doesn't admit a self-referential struct placed
//! in a buffer it also owns. What matters for NUMA locality — the
//! payload-bearing cell array — is exactly what's placed in the node-
//! bound arena; destroying the ring still destroys its arena.

use crate::arena::Arena;
use crate::invariants::{debug_assert_bounded_count, debug_assert_monotonic};
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicUsize, Ordering};

/// 128-byte aligned wrapper preventing false sharing between `head` and
/// `tail` (and between either and the read-only descriptor fields).
#[repr(align(128))]
struct CacheAligned<T> {
    value: T,
}

impl<T> CacheAligned<T> {
    const fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T> std::ops::Deref for CacheAligned<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

struct Cell<T> {
    sequence: AtomicUsize,
    data: UnsafeCell<MaybeUninit<T>>,
}

/// A bounded, lock-free MPMC ring whose cell array lives in a single
/// node-bound [`Arena`]. Capacity is a power of two, `>= 2`.
pub struct Ring<T> {
    head: CacheAligned<AtomicUsize>,
    tail: CacheAligned<AtomicUsize>,
    capacity: usize,
    mask: usize,
    cells: NonNull<Cell<T>>,
    _arena: Arena,
}

// SAFETY: access to cells is mediated entirely by the sequence-number
// protocol below; a cell is only read or written by the single thread
// that won the corresponding head/tail CAS.
unsafe impl<T: Send> Send for Ring<T> {}
unsafe impl<T: Send> Sync for Ring<T> {}

impl<T> Ring<T> {
    /// Creates a ring of `capacity` slots (must be a power of two, `>=
    /// 2`) whose backing memory is allocated on `node_id`.
    pub fn create(node_id: usize, capacity: usize) -> Option<Self> {
        if capacity < 2 || !capacity.is_power_of_two() {
            return None;
        }
        let bytes = capacity.checked_mul(std::mem::size_of::<Cell<T>>())?;
        let mut arena = Arena::create(node_id, bytes)?;
        let base = arena.alloc(bytes)?;
        let cells: NonNull<Cell<T>> = base.cast();

        // SAFETY: `cells` points to `capacity` freshly-reserved,
        // appropriately-sized and aligned slots from the arena; none have
        // been initialized yet, so writing each one is sound and does not
        // overlap.
        for i in 0..capacity {
            unsafe {
                ptr::write(
                    cells.as_ptr().add(i),
                    Cell { sequence: AtomicUsize::new(i), data: UnsafeCell::new(MaybeUninit::uninit()) },
                );
            }
        }

        Some(Self {
            head: CacheAligned::new(AtomicUsize::new(0)),
            tail: CacheAligned::new(AtomicUsize::new(0)),
            capacity,
            mask: capacity - 1,
            cells,
            _arena: arena,
        })
    }

    /// Ring capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    fn cell(&self, idx: usize) -> &Cell<T> {
        // SAFETY: idx is always masked to [0, capacity).
        unsafe { &*self.cells.as_ptr().add(idx) }
    }

    /// Approximate number of items currently queued. Racy under
    /// concurrent access; intended for diagnostics/tests only.
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        head.wrapping_sub(tail).min(self.capacity)
    }

    /// True if no items are queued (racy, see [`Ring::len`]).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attempts to enqueue `item`. Returns `false` (no waiting) if the
    /// ring is full.
    ///
    /// Claims a writable slot via CAS on `head`, then publishes the
    /// write by releasing the slot's sequence.
    pub fn push(&self, item: T) -> bool {
        let mut pos = self.head.load(Ordering::Relaxed);
        loop {
            let cell = self.cell(pos & self.mask);
            let seq = cell.sequence.load(Ordering::Acquire);
            let diff = seq as isize - pos as isize;

            if diff == 0 {
                if self
                    .head
                    .compare_exchange_weak(pos, pos.wrapping_add(1), Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
                {
                    // SAFETY: this cell was just claimed exclusively by
                    // this CAS; no other pusher may write to it until we
                    // publish the next sequence, and no popper may read it
                    // until then either.
                    unsafe { (*cell.data.get()).write(item) };
                    let published = pos.wrapping_add(1);
                    debug_assert_monotonic!("ring cell sequence", seq, published);
                    cell.sequence.store(published, Ordering::Release);
                    return true;
                }
                // Lost the race for this slot; reload and retry.
                pos = self.head.load(Ordering::Relaxed);
            } else if diff < 0 {
                return false; // full
            } else {
                pos = self.head.load(Ordering::Relaxed); // stale, reload
            }
        }
    }

    /// Attempts to dequeue one item. Returns `false` (no waiting) if the
    /// ring is empty.
    pub fn pop(&self) -> Option<T> {
        let mut pos = self.tail.load(Ordering::Relaxed);
        loop {
            let cell = self.cell(pos & self.mask);
            let seq = cell.sequence.load(Ordering::Acquire);
            let diff = seq as isize - (pos.wrapping_add(1)) as isize;

            if diff == 0 {
                if self
                    .tail
                    .compare_exchange_weak(pos, pos.wrapping_add(1), Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
                {
                    // SAFETY: exclusive claim as above, mirrored for the
                    // consumer side.
                    let item = unsafe { (*cell.data.get()).assume_init_read() };
                    let published = pos.wrapping_add(self.capacity);
                    debug_assert_monotonic!("ring cell sequence", seq, published);
                    cell.sequence.store(published, Ordering::Release);
                    return Some(item);
                }
                pos = self.tail.load(Ordering::Relaxed);
            } else if diff < 0 {
                return None; // empty
            } else {
                pos = self.tail.load(Ordering::Relaxed);
            }
        }
    }
}

impl<T> Drop for Ring<T> {
    fn drop(&mut self) {
        // Drain and drop any items still queued so T: Drop runs exactly
        // once per live element.
        while self.pop().is_some() {}
        debug_assert_bounded_count!(self.len(), self.capacity);
    }
}
