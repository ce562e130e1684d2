//! numakit - a NUMA-aware concurrency runtime
//!
//! A library that lets a process place threads, memory, and inter-thread
//! message queues on specific NUMA nodes of a shared-memory
//! multiprocessor, and that exposes lock-free and local-spinning
//! synchronization primitives designed to avoid cache-line bouncing
//! across sockets.
//!
//! # Layers
//!
//! - [`arena`] — a node-bound, huge-page-backed bump allocator.
//! - [`ring`] — a sequenced, bounded MPMC ring buffer.
//! - [`mcs`] — a fair, FIFO queue lock.
//! - [`rwlock`] — a writer-preferring reader-writer spinlock.
//! - [`mailbox`] — per-node message queues built on the ring.
//! - [`pool`] — a node-partitioned work-stealing task pool.
//! - [`runtime`] — process-wide lifecycle tying the above together.
//!
//! Topology, thread affinity, physical-page lookup, and huge-page sizing
//! are consumed through small traits ([`topology::TopologyView`],
//! [`affinity::AffinityOps`], [`page_query::PageQuery`],
//! [`hugepage::HugePageSize`]) rather than discovered directly, so the
//! core can be exercised without real NUMA hardware.
//!
//! # Example
//!
//! ```
//! use numakit::ring::Ring;
//!
//! let ring = Ring::<u64>::create(0, 4).unwrap();
//! assert!(ring.push(1));
//! assert_eq!(ring.pop(), Some(1));
//! ```

pub mod advisor;
pub mod affinity;
pub mod arena;
pub mod backoff;
pub mod error;
mod invariants;
pub mod hugepage;
pub mod mailbox;
pub mod mcs;
pub mod node_alloc;
pub mod page_query;
pub mod pool;
pub mod ring;
pub mod runtime;
pub mod rwlock;
pub mod topology;

pub use advisor::{AdvisorVerdict, MigrationAdvisor};
pub use affinity::AffinityOps;
pub use arena::Arena;
pub use backoff::Backoff;
pub use error::{NumaKitError, Result, SendOutcome, SubmitOutcome};
pub use mailbox::MailboxArray;
pub use mcs::McsLock;
pub use page_query::PageQuery;
pub use pool::Pool;
pub use ring::Ring;
pub use runtime::RuntimeContext;
pub use rwlock::RwSpinlock;
pub use topology::TopologyView;
