use thiserror::Error;

/// Errors surfaced by the core's fallible constructors and operations:
/// configuration error, resource exhaustion, and backpressure.
/// Programmer errors (use-after-destroy, concurrent arena `alloc`, a stack
/// MCS node outliving its frame) are not represented here — they are
/// undefined behavior by design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NumaKitError {
    /// Invalid node id, non-power-of-two ring capacity, or zero arena size.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// Memory reservation or node binding failed.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(&'static str),
    /// Ring congestion on a mailbox send.
    #[error("ring congestion")]
    Congestion,
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, NumaKitError>;

/// Outcome of `Mailbox::send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Delivered (`0`).
    Delivered,
    /// Invalid target node (`-1`).
    InvalidNode,
    /// Target mailbox ring is full (`-2`).
    Congested,
}

/// Outcome of a pool submission: either queued, or the free pool was
/// exhausted (`busy`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Descriptor claimed and task queued.
    Queued,
    /// No free descriptor available; caller may retry.
    Busy,
}
