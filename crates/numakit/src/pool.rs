//! L5: the work-stealing task pool.
//!
//! A task is a boxed closure rather than a `(func, arg)` pair — Rust's
//! closures already capture their environment, so there is no separate
//! `arg` pointer to carry. Each node owns a `task_queue` (work waiting to
//! run) and a `free_queue` (unused descriptor slots), backed by a physical
//! array of descriptor slots bump-allocated on that node. A descriptor
//! popped from a node's free queue must be returned to that same node's
//! free queue after running — never the executing worker's, if a steal
//! crossed node boundaries — which is exactly what [`run_task`] does by
//! operating on the *owning* `NodePool`, not the stealer's.
//!
//! Construction is two-phase: every node's queues and descriptor array
//! are fully built (phase 1) before any worker thread is started
//! (phase 2), so no worker can observe a partially-initialized sibling
//! node while stealing.

use crate::affinity::AffinityOps;
use crate::arena::Arena;
use crate::backoff::Backoff;
use crate::error::SubmitOutcome;
use crate::invariants::debug_assert_home_queue_return;
use crate::page_query::PageQuery;
use crate::ring::Ring;
use crate::topology::TopologyView;
use std::cell::UnsafeCell;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

type TaskFn = Box<dyn FnOnce() + Send + 'static>;

/// One descriptor slot: a closure waiting to run, or empty.
struct TaskSlot {
    func: UnsafeCell<Option<TaskFn>>,
}

// SAFETY: a slot index is only ever touched by whichever thread currently
// holds it via an exclusive pop from `task_queue` or `free_queue` — the
// ring's CAS-claim protocol is the synchronization.
unsafe impl Send for TaskSlot {}
unsafe impl Sync for TaskSlot {}

/// A single node's task queue, free list, and the descriptor array
/// backing both, all bound to that node.
struct NodePool {
    node_id: usize,
    task_queue: Ring<usize>,
    free_queue: Ring<usize>,
    task_array: NonNull<TaskSlot>,
    capacity: usize,
    _arena: Arena,
}

unsafe impl Send for NodePool {}
unsafe impl Sync for NodePool {}

impl NodePool {
    fn create(node_id: usize, capacity: usize) -> Option<Self> {
        let task_queue = Ring::create(node_id, capacity)?;
        let free_queue = Ring::create(node_id, capacity)?;

        let bytes = capacity.checked_mul(std::mem::size_of::<TaskSlot>())?;
        let mut arena = Arena::create(node_id, bytes)?;
        let base = arena.alloc(bytes)?;
        let task_array: NonNull<TaskSlot> = base.cast();

        // SAFETY: `task_array` points at `capacity` freshly reserved,
        // uninitialized, non-overlapping slots from the arena.
        for i in 0..capacity {
            unsafe { ptr::write(task_array.as_ptr().add(i), TaskSlot { func: UnsafeCell::new(None) }) };
        }
        for i in 0..capacity {
            let queued = free_queue.push(i);
            debug_assert!(queued, "free queue must accept every slot at creation");
        }

        Some(Self { node_id, task_queue, free_queue, task_array, capacity, _arena: arena })
    }

    fn slot(&self, idx: usize) -> &TaskSlot {
        debug_assert!(idx < self.capacity);
        // SAFETY: idx < capacity, task_array has `capacity` live elements.
        unsafe { &*self.task_array.as_ptr().add(idx) }
    }
}

/// Default worker count per node, `ceil(total_cpus / node_count)`, at
/// least 1.
pub fn default_worker_count(topology: &dyn TopologyView) -> usize {
    let total = topology.total_cpus().max(1);
    let nodes = topology.node_count().max(1);
    total.div_ceil(nodes).max(1)
}

/// Default per-node ring capacity: `1024` slots per worker, rounded up
/// to a power of two with a `1024` floor.
pub fn default_ring_capacity(workers_per_node: usize) -> usize {
    let raw = workers_per_node.max(1) * 1024;
    raw.next_power_of_two().max(1024)
}

/// A NUMA-aware work-stealing task pool: one worker-thread group per
/// node, each preferring its own node's queue and falling back to
/// stealing from the nearest other nodes (per [`TopologyView::distance`])
/// before idling.
pub struct Pool {
    nodes: Vec<Arc<NodePool>>,
    stop: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
    threads_started: usize,
    active_threads: Arc<AtomicUsize>,
}

impl Pool {
    /// Builds a pool with `threads_per_node` workers on each of
    /// `topology`'s nodes, each node's queues sized `capacity` (must be a
    /// power of two, `>= 2`). `affinity` pins each worker to its node
    /// before it starts polling.
    pub fn create(
        topology: &dyn TopologyView,
        affinity: Arc<dyn AffinityOps>,
        threads_per_node: usize,
        capacity: usize,
    ) -> Option<Self> {
        let num_nodes = topology.node_count();

        // Phase 1: allocate every node's queues and descriptor array
        // before any worker starts, so stealing never observes a
        // half-built sibling.
        let mut nodes = Vec::with_capacity(num_nodes);
        let mut steal_orders = Vec::with_capacity(num_nodes);
        for node in 0..num_nodes {
            nodes.push(Arc::new(NodePool::create(node, capacity)?));
            let mut order: Vec<usize> = (0..num_nodes).filter(|&other| other != node).collect();
            order.sort_by_key(|&other| topology.distance(node, other));
            steal_orders.push(order);
        }

        let stop = Arc::new(AtomicBool::new(false));
        let active_threads = Arc::new(AtomicUsize::new(0));
        let mut workers = Vec::new();
        let mut threads_started = 0;

        // Phase 2: start workers.
        for node in 0..num_nodes {
            let steal_order = steal_orders[node].clone();
            for _ in 0..threads_per_node {
                let nodes = nodes.clone();
                let stop = Arc::clone(&stop);
                let affinity = Arc::clone(&affinity);
                let steal_order = steal_order.clone();
                let active_threads = Arc::clone(&active_threads);
                let spawned = thread::Builder::new().name(format!("numakit-worker-{node}")).spawn(move || {
                    affinity.pin_current_to_node(node);
                    active_threads.fetch_add(1, Ordering::Relaxed);
                    worker_loop(&nodes, node, &steal_order, &stop);
                    active_threads.fetch_sub(1, Ordering::Relaxed);
                });
                if spawned.is_ok() {
                    threads_started += 1;
                }
                if let Ok(handle) = spawned {
                    workers.push(handle);
                }
            }
        }

        Some(Self { nodes, stop, workers, threads_started, active_threads })
    }

    /// Number of nodes this pool was created over.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// How many worker threads actually started; teardown only joins
    /// threads that successfully spawned.
    pub fn threads_started(&self) -> usize {
        self.threads_started
    }

    /// Live count of worker threads currently inside their poll loop
    /// (spawned and not yet returned). Mirrors the C context's
    /// `active_threads` gauge.
    pub fn active_threads(&self) -> usize {
        self.active_threads.load(Ordering::Relaxed)
    }

    /// Approximate number of tasks currently queued at `node` (racy
    /// diagnostic, see [`Ring::len`]).
    pub fn pending_at(&self, node: usize) -> usize {
        self.nodes.get(node).map_or(0, |p| p.task_queue.len())
    }

    /// Submits `task` to run on `target_node`. An out-of-range node
    /// redirects to node 0 (Open Question 3, recorded in DESIGN.md: the C
    /// original does the same rather than reject the submission).
    pub fn submit_to_node<F>(&self, target_node: usize, task: F) -> SubmitOutcome
    where
        F: FnOnce() + Send + 'static,
    {
        let node = if target_node < self.nodes.len() { target_node } else { 0 };
        let pool = &self.nodes[node];

        let Some(idx) = pool.free_queue.pop() else {
            return SubmitOutcome::Busy;
        };
        let slot = pool.slot(idx);
        // SAFETY: `idx` was just claimed exclusively from the free queue;
        // no other thread can observe this slot until it is pushed back
        // onto `task_queue` below.
        unsafe { *slot.func.get() = Some(Box::new(task)) };

        let mut backoff = Backoff::new();
        while !pool.task_queue.push(idx) {
            backoff.snooze();
        }
        SubmitOutcome::Queued
    }

    /// Submits `task`, routing it to the node that physically backs
    /// `data`, as reported by `page_query`. Falls back to node 0 if the
    /// node can't be determined.
    pub fn submit_local<F, P>(&self, page_query: &P, data: *const u8, task: F) -> SubmitOutcome
    where
        F: FnOnce() + Send + 'static,
        P: PageQuery,
    {
        let node = page_query.physical_node_of(data).unwrap_or(0);
        self.submit_to_node(node, task)
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(nodes: &[Arc<NodePool>], my_node: usize, steal_order: &[usize], stop: &AtomicBool) {
    let mut backoff = Backoff::new();
    while !stop.load(Ordering::Relaxed) {
        let home = &nodes[my_node];
        if let Some(idx) = home.task_queue.pop() {
            run_task(home, idx);
            backoff.reset();
            continue;
        }

        let mut stole = false;
        for &target in steal_order {
            let target_pool = &nodes[target];
            if let Some(idx) = target_pool.task_queue.pop() {
                run_task(target_pool, idx);
                stole = true;
                backoff.reset();
                break;
            }
        }

        if !stole {
            backoff.snooze();
        }
    }
}

/// Runs the task in slot `idx` of `owner`, then returns the descriptor to
/// `owner`'s own free queue — its home, regardless of which node's worker
/// executed it.
fn run_task(owner: &NodePool, idx: usize) {
    let slot = owner.slot(idx);
    // SAFETY: `idx` was popped exclusively from `owner.task_queue`; no
    // other thread may touch this slot's `func` until it is returned to
    // `owner.free_queue` below.
    let task = unsafe { (*slot.func.get()).take() };
    if let Some(task) = task {
        task();
    }

    // Returned to `owner`'s own free queue, never the executing worker's —
    // guaranteed structurally since `run_task` is always called with the
    // node pool the slot index was popped from.
    debug_assert_home_queue_return!(idx < owner.capacity);

    let mut backoff = Backoff::new();
    while !owner.free_queue.push(idx) {
        backoff.snooze();
    }
}
