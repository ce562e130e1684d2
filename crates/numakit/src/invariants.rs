//! Debug assertion macros for invariants that must hold across the
//! ring, lock, and pool layers. Active only in debug builds
//! (`debug_assert!`), zero overhead in release.

/// Bounded count: `0 <= in_flight <= capacity`.
macro_rules! debug_assert_bounded_count {
    ($count:expr, $capacity:expr) => {
        debug_assert!(
            $count <= $capacity,
            "bounded-count violated: count {} exceeds capacity {}",
            $count,
            $capacity
        )
    };
}

/// A sequence counter must never decrease (wrapping comparisons aside).
macro_rules! debug_assert_monotonic {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!($new >= $old, "{} decreased from {} to {}", $name, $old, $new)
    };
}

/// RW-lock exclusion: `writer_active` and `reader_count > 0` must never
/// be observed together.
macro_rules! debug_assert_rw_exclusion {
    ($state:expr, $writer_active_bit:expr, $reader_mask:expr) => {
        debug_assert!(
            ($state & $writer_active_bit) == 0 || ($state & $reader_mask) == 0,
            "RW exclusion violated: state {:#x} has both writer_active and readers",
            $state
        )
    };
}

/// Pool conservation: a descriptor must be returned to its own home
/// free queue, never the executing worker's.
macro_rules! debug_assert_home_queue_return {
    ($returned_to_home:expr) => {
        debug_assert!($returned_to_home, "task descriptor returned to the wrong node's free queue")
    };
}

pub(crate) use debug_assert_bounded_count;
pub(crate) use debug_assert_home_queue_return;
pub(crate) use debug_assert_monotonic;
pub(crate) use debug_assert_rw_exclusion;
