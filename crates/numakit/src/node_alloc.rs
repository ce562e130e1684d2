//! `NodeAllocator`: reserving raw, node-bound memory. This is the
//! mechanism `Arena` delegates to; kept as a trait (rather than inlined
//! `mmap`/`mbind` calls in `arena.rs`) so the arena can be exercised in
//! tests without requiring real NUMA hardware, huge pages, or root
//! privileges — the heap-backed allocator below gives every UMA/CI host
//! a graceful degrade-to-heap path when the real NUMA capability is
//! missing.

use std::alloc::{alloc, dealloc, Layout};
use std::ptr::NonNull;

/// Result of a successful node-bound reservation.
pub struct NodeAllocation {
    /// Start of the reserved region.
    pub ptr: NonNull<u8>,
    /// Bytes actually reserved (rounded up per the allocator's policy).
    pub size: usize,
    /// Whether huge-page backing was obtained.
    pub huge: bool,
}

/// Reserves and releases raw memory bound to a NUMA node.
pub trait NodeAllocator: Send + Sync {
    /// Reserve at least `bytes` on `node`. On a UMA system every request
    /// may be satisfied by generic allocation on node 0 regardless of the
    /// requested node.
    fn alloc_on(&self, node: usize, bytes: usize) -> Option<NodeAllocation>;
    /// Release a region previously returned by `alloc_on`.
    ///
    /// # Safety
    /// `ptr`/`size` must be exactly a prior `alloc_on` result that has not
    /// already been freed.
    unsafe fn free(&self, ptr: NonNull<u8>, size: usize);

    /// Best-effort request to move an already-allocated region to
    /// `node`. Not part of the core arena/ring/pool path — a convenience
    /// companion to `PageQuery` for callers that decide, after the fact,
    /// that a region should live elsewhere. Default implementation is a
    /// no-op; only a NUMA-aware allocator can honor it.
    ///
    /// # Safety
    /// `ptr`/`size` must describe a live region previously returned by
    /// `alloc_on` on `self`.
    unsafe fn migrate(&self, _ptr: NonNull<u8>, _size: usize, _node: usize) -> bool {
        false
    }
}

/// Ordinary heap allocation, 64-byte aligned, never huge-page backed.
/// This is the default `NodeAllocator` without the `numa` feature, and
/// is what every test in this crate uses — it makes the arena (and
/// everything built on it) fully testable on any host.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapNodeAllocator;

const ALLOC_ALIGN: usize = 64;

impl NodeAllocator for HeapNodeAllocator {
    fn alloc_on(&self, _node: usize, bytes: usize) -> Option<NodeAllocation> {
        if bytes == 0 {
            return None;
        }
        let layout = Layout::from_size_align(bytes, ALLOC_ALIGN).ok()?;
        let ptr = unsafe { alloc(layout) };
        let ptr = NonNull::new(ptr)?;
        Some(NodeAllocation { ptr, size: bytes, huge: false })
    }

    unsafe fn free(&self, ptr: NonNull<u8>, size: usize) {
        if let Ok(layout) = Layout::from_size_align(size, ALLOC_ALIGN) {
            dealloc(ptr.as_ptr(), layout);
        }
    }
}

#[cfg(feature = "numa")]
mod linux {
    use super::{NodeAllocation, NodeAllocator};
    use std::ptr::NonNull;

    /// `mmap` + `mbind` reservation: reserve anonymous private memory
    /// (optionally `MAP_HUGETLB`), then strict-bind to `node` with a
    /// soft-bind fallback if the strict bind fails.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct LinuxNodeAllocator;

    impl NodeAllocator for LinuxNodeAllocator {
        fn alloc_on(&self, node: usize, bytes: usize) -> Option<NodeAllocation> {
            let (ptr, huge) = mmap_reserve(bytes)?;

            let nodemask: libc::c_ulong = 1u64.checked_shl(node as u32)? as libc::c_ulong;
            let strict = mbind(ptr, bytes, &nodemask, MPOL_BIND, 0);
            if strict != 0 {
                // Strict bind failed (e.g. node absent); fall back to a
                // soft/preferred bind rather than failing the whole
                // allocation.
                let _ = mbind(ptr, bytes, &nodemask, MPOL_PREFERRED, 0);
            }

            Some(NodeAllocation {
                ptr: NonNull::new(ptr.cast())?,
                size: bytes,
                huge,
            })
        }

        unsafe fn free(&self, ptr: NonNull<u8>, size: usize) {
            libc::munmap(ptr.as_ptr().cast(), size);
        }

        unsafe fn migrate(&self, ptr: NonNull<u8>, size: usize, node: usize) -> bool {
            let Some(nodemask) = 1u64.checked_shl(node as u32) else {
                return false;
            };
            let nodemask = nodemask as libc::c_ulong;
            mbind(ptr.as_ptr().cast(), size, &nodemask, MPOL_BIND, MPOL_MF_MOVE) == 0
        }
    }

    const MPOL_BIND: libc::c_int = 2;
    const MPOL_PREFERRED: libc::c_int = 1;
    const MPOL_MF_MOVE: libc::c_uint = 1 << 1;

    fn mmap_reserve(bytes: usize) -> Option<(*mut libc::c_void, bool)> {
        unsafe {
            let huge_flag = libc::MAP_HUGETLB;
            let ptr = libc::mmap(
                std::ptr::null_mut(),
                bytes,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | huge_flag,
                -1,
                0,
            );
            if ptr != libc::MAP_FAILED {
                return Some((ptr, true));
            }

            // Huge-page reservation failed; fall back to base pages.
            let ptr = libc::mmap(
                std::ptr::null_mut(),
                bytes,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            );
            if ptr == libc::MAP_FAILED {
                None
            } else {
                Some((ptr, false))
            }
        }
    }

    /// Thin wrapper over the `mbind(2)` syscall (no libnuma dependency).
    fn mbind(addr: *mut libc::c_void, len: usize, nodemask: &libc::c_ulong, mode: libc::c_int, flags: libc::c_uint) -> libc::c_long {
        unsafe {
            libc::syscall(
                libc::SYS_mbind,
                addr,
                len,
                mode,
                nodemask as *const libc::c_ulong,
                (std::mem::size_of::<libc::c_ulong>() * 8 + 1) as libc::c_ulong,
                flags,
            ) as libc::c_long
        }
    }
}

#[cfg(feature = "numa")]
pub use linux::LinuxNodeAllocator;
