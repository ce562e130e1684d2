//! L0: the NUMA arena allocator — a node-bound, huge-page-backed bump
//! arena.

use crate::hugepage::{HugePageSize, UnknownHugePageSize, DEFAULT_HUGE_PAGE_SIZE};
use crate::node_alloc::{HeapNodeAllocator, NodeAllocator};
use std::ptr::NonNull;

const CACHE_LINE: usize = 64;

fn align_up(n: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (n + align - 1) & !(align - 1)
}

/// A contiguous, node-bound, bump-only memory region.
///
/// Invariants: `0 <= used <= size`; every pointer returned by `alloc`
/// lies in `[base, base + size)`; once handed out a pointer is never
/// individually freed; `reset` sets `used := 0` and invalidates every
/// previously returned pointer immediately; `destroy` returns the region
/// to the OS. An arena is owned by exactly one creator and must not be
/// used after `destroy` (enforced here by consuming `self`).
///
/// `alloc` is **not** thread-safe: concurrent callers must serialize
/// externally. Accordingly `Arena` is `Send` (it can be handed to the one
/// thread that will drive it) but not `Sync`.
pub struct Arena {
    base: NonNull<u8>,
    size: usize,
    used: usize,
    node_id: usize,
    huge: bool,
    allocator: Box<dyn NodeAllocator>,
}

unsafe impl Send for Arena {}

impl Arena {
    /// Creates an arena of at least `size` bytes bound to `node_id`,
    /// using the default allocator (huge-page `mmap`+`mbind` under the
    /// `numa` feature, plain heap memory otherwise).
    pub fn create(node_id: usize, size: usize) -> Option<Self> {
        #[cfg(feature = "numa")]
        let allocator: Box<dyn NodeAllocator> = Box::new(crate::node_alloc::LinuxNodeAllocator);
        #[cfg(not(feature = "numa"))]
        let allocator: Box<dyn NodeAllocator> = Box::new(HeapNodeAllocator);

        #[cfg(feature = "numa")]
        let huge_page_size: Box<dyn HugePageSize> = Box::new(crate::hugepage::LinuxHugePageSize);
        #[cfg(not(feature = "numa"))]
        let huge_page_size: Box<dyn HugePageSize> = Box::new(UnknownHugePageSize);

        Self::create_with(node_id, size, allocator, huge_page_size.as_ref())
    }

    /// Creates an arena using an explicit allocator and huge-page-size
    /// source. Exists so tests (and the ring/pool layers, indirectly) can
    /// exercise the arena without touching real NUMA hardware.
    pub fn create_with(
        node_id: usize,
        size: usize,
        allocator: Box<dyn NodeAllocator>,
        huge_page_size: &dyn HugePageSize,
    ) -> Option<Self> {
        if size == 0 {
            return None;
        }
        let huge_sz = {
            let sz = huge_page_size.huge_page_size();
            if sz == 0 {
                DEFAULT_HUGE_PAGE_SIZE
            } else {
                sz
            }
        };
        let aligned = align_up(size, huge_sz);

        let allocation = allocator.alloc_on(node_id, aligned)?;
        Some(Self {
            base: allocation.ptr,
            size: allocation.size,
            used: 0,
            node_id,
            huge: allocation.huge,
            allocator,
        })
    }

    /// The NUMA node this arena is bound to.
    pub fn node_id(&self) -> usize {
        self.node_id
    }

    /// Aligned capacity, bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Current bump offset.
    pub fn used(&self) -> usize {
        self.used
    }

    /// Whether huge-page backing was obtained (`false` means the arena
    /// fell back to base pages, or no huge-page support is compiled in).
    pub fn huge(&self) -> bool {
        self.huge
    }

    /// Bump-allocates `n` bytes, aligned up to a 64-byte cache line.
    /// Returns `None` if the arena has no remaining capacity.
    ///
    /// Not thread-safe — callers must serialize concurrent `alloc` calls
    /// externally.
    pub fn alloc(&mut self, n: usize) -> Option<NonNull<u8>> {
        let aligned = align_up(n, CACHE_LINE);
        if self.used.checked_add(aligned)? > self.size {
            return None;
        }
        // SAFETY: base..base+size is a single allocation owned by this
        // arena; `used + aligned <= size` was just checked.
        let ptr = unsafe { self.base.as_ptr().add(self.used) };
        self.used += aligned;
        NonNull::new(ptr)
    }

    /// Resets the bump offset to zero. Every pointer previously returned
    /// by `alloc` is invalidated immediately and must not be used again.
    pub fn reset(&mut self) {
        self.used = 0;
    }

    /// Destroys the arena, returning its region to the OS.
    pub fn destroy(self) {
        // Drop performs the actual unmap; this method exists to make
        // destruction an explicit, named operation, and to document that
        // using the arena after this call is undefined (it no longer
        // exists to use).
        drop(self);
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        unsafe { self.allocator.free(self.base, self.size) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hugepage::FixedHugePageSize;

    fn test_arena(node: usize, size: usize) -> Arena {
        Arena::create_with(node, size, Box::new(HeapNodeAllocator), &FixedHugePageSize(4096)).unwrap()
    }

    #[test]
    fn zero_size_fails() {
        assert!(Arena::create_with(0, 0, Box::new(HeapNodeAllocator), &FixedHugePageSize(4096)).is_none());
    }

    #[test]
    fn size_rounds_up_to_huge_page() {
        let arena = test_arena(0, 1);
        assert_eq!(arena.size(), 4096);
    }

    #[test]
    fn consecutive_allocs_are_cache_line_aligned_apart() {
        let mut arena = test_arena(0, 4096);
        let p1 = arena.alloc(10).unwrap();
        let p2 = arena.alloc(20).unwrap();
        let diff = p2.as_ptr() as usize - p1.as_ptr() as usize;
        assert_eq!(diff, align_up(10, 64));
    }

    #[test]
    fn alloc_respects_capacity() {
        let mut arena = test_arena(0, 128);
        assert!(arena.alloc(100).is_some());
        // 128 bytes total, 64-byte aligned allocations: one more 64-byte
        // alloc exactly fits, a second does not.
        assert!(arena.alloc(1).is_some());
        assert!(arena.alloc(1).is_none());
    }

    #[test]
    fn reset_reclaims_capacity() {
        let mut arena = test_arena(0, 128);
        arena.alloc(64).unwrap();
        arena.alloc(64).unwrap();
        assert!(arena.alloc(1).is_none());
        arena.reset();
        assert_eq!(arena.used(), 0);
        assert!(arena.alloc(64).is_some());
    }

    #[test]
    fn node_id_is_recorded() {
        let arena = test_arena(3, 64);
        assert_eq!(arena.node_id(), 3);
    }
}
