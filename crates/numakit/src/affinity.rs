//! `AffinityOps`: pinning the calling thread to a node or CPU, and asking
//! where the calling thread currently runs. Applying affinity policy is
//! out of scope for the core; this module only defines the seam and a
//! couple of concrete implementations the rest of the crate can be built
//! and tested against.

use crate::topology::TopologyView;
use std::cell::Cell;

/// Pin/query operations the pool and mailbox layer need from the host.
pub trait AffinityOps: Send + Sync {
    /// Pin the calling thread to every CPU belonging to `node`.
    fn pin_current_to_node(&self, node: usize);
    /// Pin the calling thread to a single logical CPU.
    fn pin_current_to_cpu(&self, cpu: usize);
    /// The logical CPU the calling thread is currently running on, if known.
    fn current_cpu(&self) -> Option<usize>;
    /// The NUMA node the calling thread is currently running on, if known.
    fn current_node(&self) -> Option<usize>;
    /// Remove any affinity restriction on the calling thread.
    fn unpin_current(&self);
}

thread_local! {
    static SIMULATED_NODE: Cell<Option<usize>> = const { Cell::new(None) };
    static SIMULATED_CPU: Cell<Option<usize>> = const { Cell::new(None) };
}

/// An `AffinityOps` implementation backed by a thread-local "where am I
/// pinned" cell rather than real OS affinity syscalls.
///
/// This is the default off the `numa` feature, and is what every test in
/// this crate uses: it lets worker threads and test producers/consumers
/// simulate being pinned to a node without needing real NUMA hardware,
/// root privileges, or a multi-socket CI box. `pin_current_to_node`
/// records the node (and its first CPU) in a thread-local; `current_node`
/// and `current_cpu` read it back. Distinct threads have independent
/// state, exactly like real thread affinity.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedAffinity;

impl AffinityOps for SimulatedAffinity {
    fn pin_current_to_node(&self, node: usize) {
        SIMULATED_NODE.with(|c| c.set(Some(node)));
    }

    fn pin_current_to_cpu(&self, cpu: usize) {
        SIMULATED_CPU.with(|c| c.set(Some(cpu)));
    }

    fn current_cpu(&self) -> Option<usize> {
        SIMULATED_CPU.with(Cell::get)
    }

    fn current_node(&self) -> Option<usize> {
        SIMULATED_NODE.with(Cell::get)
    }

    fn unpin_current(&self) {
        SIMULATED_NODE.with(|c| c.set(None));
        SIMULATED_CPU.with(|c| c.set(None));
    }
}

/// Convenience: pin to a node by binding to its first CPU in `topology`.
pub fn pin_to_node_via_topology(ops: &dyn AffinityOps, topology: &dyn TopologyView, node: usize) {
    ops.pin_current_to_node(node);
    if let Some(&cpu) = topology.cpus_of(node).first() {
        ops.pin_current_to_cpu(cpu);
    }
}

#[cfg(feature = "numa")]
mod linux {
    use super::AffinityOps;

    /// Real Linux affinity backed by `sched_setaffinity` and `getcpu(2)`.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct LinuxAffinity;

    impl AffinityOps for LinuxAffinity {
        fn pin_current_to_node(&self, node: usize) {
            // Without a resolved cpuset we can't know which CPUs belong to
            // `node` from libc alone (that mapping is hwloc's job, out of
            // scope here); callers that have a `TopologyView` should
            // prefer `pin_to_node_via_topology`. This falls back to a
            // single representative CPU equal to the node index, which is
            // only meaningful in combination with a topology.
            self.pin_current_to_cpu(node);
        }

        fn pin_current_to_cpu(&self, cpu: usize) {
            unsafe {
                let mut set: libc::cpu_set_t = std::mem::zeroed();
                libc::CPU_ZERO(&mut set);
                libc::CPU_SET(cpu, &mut set);
                libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set);
            }
        }

        fn current_cpu(&self) -> Option<usize> {
            getcpu().map(|(cpu, _)| cpu)
        }

        fn current_node(&self) -> Option<usize> {
            getcpu().map(|(_, node)| node)
        }

        fn unpin_current(&self) {
            unsafe {
                let mut set: libc::cpu_set_t = std::mem::zeroed();
                for cpu in 0..libc::CPU_SETSIZE as usize {
                    libc::CPU_SET(cpu, &mut set);
                }
                libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set);
            }
        }
    }

    /// `syscall(SYS_getcpu, &cpu, &node, NULL)`.
    fn getcpu() -> Option<(usize, usize)> {
        let mut cpu: libc::c_uint = 0;
        let mut node: libc::c_uint = 0;
        let ret = unsafe {
            libc::syscall(
                libc::SYS_getcpu,
                &mut cpu as *mut libc::c_uint,
                &mut node as *mut libc::c_uint,
                std::ptr::null_mut::<libc::c_void>(),
            )
        };
        if ret == 0 {
            Some((cpu as usize, node as usize))
        } else {
            None
        }
    }
}

#[cfg(feature = "numa")]
pub use linux::LinuxAffinity;
