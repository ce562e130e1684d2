//! L6: process-wide runtime context and lifecycle.
//!
//! A bare CAS flag can't, on its own, make "build the mailboxes and pool"
//! atomic with "flip to initialized" on stable Rust, so this holds the
//! built-or-not state behind a `Mutex`: the lock is only ever taken on
//! `init`/`teardown`, never on the hot paths (`send`, `process_local`,
//! `submit_to_node`), so it does not compromise the lock-free claims made
//! for those operations.

use crate::advisor::MigrationAdvisor;
use crate::affinity::AffinityOps;
use crate::error::{NumaKitError, Result, SendOutcome, SubmitOutcome};
use crate::mailbox::{MailboxArray, DEFAULT_MAILBOX_CAPACITY};
use crate::page_query::PageQuery;
use crate::pool::{default_ring_capacity, default_worker_count, Pool};
use crate::topology::TopologyView;
use std::sync::{Arc, Mutex};

struct Inner<M: Send + 'static> {
    topology: Arc<dyn TopologyView>,
    mailboxes: MailboxArray<M>,
    pool: Pool,
    advisor: MigrationAdvisor,
}

/// Process-wide runtime state: resolved topology, one mailbox per node,
/// the work-stealing pool, and the (stub) migration advisor.
///
/// `M` is the message type carried by mailboxes, chosen by the caller
/// instead of an untyped payload pointer.
pub struct RuntimeContext<M: Send + 'static> {
    inner: Mutex<Option<Inner<M>>>,
    affinity: Arc<dyn AffinityOps>,
}

impl<M: Send + 'static> RuntimeContext<M> {
    /// Creates an uninitialized runtime context bound to `affinity`.
    /// Nothing is allocated until [`RuntimeContext::init`] succeeds.
    pub fn new(affinity: Arc<dyn AffinityOps>) -> Self {
        Self { inner: Mutex::new(None), affinity }
    }

    /// Resolves `topology`, allocates one mailbox ring per node (default
    /// capacity [`DEFAULT_MAILBOX_CAPACITY`]), and starts the work-
    /// stealing pool with the default worker count and ring capacity.
    /// Idempotent: a successful call followed by another is a no-op
    /// success; a failed call leaves the context uninitialized so a later
    /// call can retry.
    pub fn init(&self, topology: Arc<dyn TopologyView>) -> Result<()> {
        let mut guard = self.inner.lock().expect("runtime mutex poisoned");
        if guard.is_some() {
            return Ok(()); // already initialized, idempotent no-op
        }

        let node_count = topology.node_count();
        let mailboxes = MailboxArray::create(node_count, DEFAULT_MAILBOX_CAPACITY)
            .ok_or(NumaKitError::ResourceExhausted("mailbox ring allocation failed"))?;

        let workers_per_node = default_worker_count(topology.as_ref());
        let ring_capacity = default_ring_capacity(workers_per_node);
        let pool = Pool::create(topology.as_ref(), Arc::clone(&self.affinity), workers_per_node, ring_capacity)
            .ok_or(NumaKitError::ResourceExhausted("task pool allocation failed"))?;

        *guard = Some(Inner { topology, mailboxes, pool, advisor: MigrationAdvisor::new() });
        Ok(())
    }

    /// True once [`RuntimeContext::init`] has succeeded and
    /// [`RuntimeContext::teardown`] hasn't run since.
    pub fn is_initialized(&self) -> bool {
        self.inner.lock().expect("runtime mutex poisoned").is_some()
    }

    /// Tears down mailboxes and the pool first, then releases the
    /// topology handle.
    pub fn teardown(&self) {
        let mut guard = self.inner.lock().expect("runtime mutex poisoned");
        *guard = None; // Inner's Drop tears down pool + mailboxes first
    }

    /// Sends `payload` to `target_node`'s mailbox. Returns
    /// [`SendOutcome::InvalidNode`] if the runtime isn't initialized.
    pub fn send(&self, target_node: usize, payload: M) -> SendOutcome {
        let guard = self.inner.lock().expect("runtime mutex poisoned");
        match guard.as_ref() {
            Some(inner) => inner.mailboxes.send(target_node, payload),
            None => SendOutcome::InvalidNode,
        }
    }

    /// Drains up to `limit` messages from the calling thread's mailbox
    /// (node determined via the runtime's [`AffinityOps`]), invoking
    /// `handler` for each. Returns `0` if the runtime isn't initialized
    /// or the current node is unknown.
    pub fn process_local<F: FnMut(M)>(&self, handler: F, limit: usize) -> usize {
        let Some(node) = self.affinity.current_node() else {
            return 0;
        };
        let guard = self.inner.lock().expect("runtime mutex poisoned");
        match guard.as_ref() {
            Some(inner) => inner.mailboxes.process_local(node, handler, limit),
            None => 0,
        }
    }

    /// Submits a task to `target_node`'s pool queue.
    pub fn submit_to_node<F>(&self, target_node: usize, task: F) -> SubmitOutcome
    where
        F: FnOnce() + Send + 'static,
    {
        let guard = self.inner.lock().expect("runtime mutex poisoned");
        match guard.as_ref() {
            Some(inner) => inner.pool.submit_to_node(target_node, task),
            None => SubmitOutcome::Busy,
        }
    }

    /// Submits a task, routed to the node physically backing `data` per
    /// `page_query`.
    pub fn submit_local<F, P>(&self, page_query: &P, data: *const u8, task: F) -> SubmitOutcome
    where
        F: FnOnce() + Send + 'static,
        P: PageQuery,
    {
        let guard = self.inner.lock().expect("runtime mutex poisoned");
        match guard.as_ref() {
            Some(inner) => inner.pool.submit_local(page_query, data, task),
            None => SubmitOutcome::Busy,
        }
    }

    /// Number of nodes the runtime was initialized over, or `0` if
    /// uninitialized.
    pub fn node_count(&self) -> usize {
        self.inner.lock().expect("runtime mutex poisoned").as_ref().map_or(0, |inner| inner.topology.node_count())
    }

    /// Configures the (stub) migration advisor's threshold.
    pub fn set_advisor_threshold(&self, mpki: f64) {
        if let Some(inner) = self.inner.lock().expect("runtime mutex poisoned").as_mut() {
            inner.advisor.set_threshold(mpki);
        }
    }

    /// Live count of pool worker threads currently running, mirroring
    /// the C context's `active_threads` gauge. `0` if uninitialized.
    pub fn active_threads(&self) -> usize {
        self.inner.lock().expect("runtime mutex poisoned").as_ref().map_or(0, |inner| inner.pool.active_threads())
    }
}
