//! L4: per-node mailboxes.
//!
//! Each node owns exactly one [`Ring`], created on that node so the
//! consumer that drains it (a worker pinned to that node, per
//! [`crate::affinity::AffinityOps`]) always touches local memory. Sending
//! is lock-free MPMC; in practice each mailbox usually has one consumer,
//! but using the fully MPMC [`Ring`] from L1 is a superset of
//! that guarantee).

use crate::error::SendOutcome;
use crate::ring::Ring;

/// Default mailbox ring capacity, used when a caller doesn't specify one
/// (see DESIGN.md's Open Question 1: kept configurable so callers can
/// size mailboxes for their workload).
pub const DEFAULT_MAILBOX_CAPACITY: usize = 4096;

/// One ring buffer per NUMA node, each allocated on its own node.
pub struct MailboxArray<T> {
    rings: Vec<Ring<T>>,
}

impl<T> MailboxArray<T> {
    /// Creates one mailbox ring per node in `0..node_count`, each sized
    /// `capacity` (must be a power of two, `>= 2`), bound to its own node.
    pub fn create(node_count: usize, capacity: usize) -> Option<Self> {
        let mut rings = Vec::with_capacity(node_count);
        for node in 0..node_count {
            rings.push(Ring::create(node, capacity)?);
        }
        Some(Self { rings })
    }

    /// Number of mailboxes (== node count).
    pub fn len(&self) -> usize {
        self.rings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }

    /// Enqueues `payload` onto `target_node`'s mailbox.
    pub fn send(&self, target_node: usize, payload: T) -> SendOutcome {
        match self.rings.get(target_node) {
            None => SendOutcome::InvalidNode,
            Some(ring) => {
                if ring.push(payload) {
                    SendOutcome::Delivered
                } else {
                    SendOutcome::Congested
                }
            }
        }
    }

    /// Drains up to `limit` messages (`0` means unbounded) from
    /// `current_node`'s mailbox, invoking `handler` for each. Returns the
    /// number processed.
    pub fn process_local<F: FnMut(T)>(&self, current_node: usize, mut handler: F, limit: usize) -> usize {
        let Some(ring) = self.rings.get(current_node) else {
            return 0;
        };
        let mut processed = 0;
        while limit == 0 || processed < limit {
            match ring.pop() {
                Some(msg) => {
                    handler(msg);
                    processed += 1;
                }
                None => break,
            }
        }
        processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_to_invalid_node_reports_invalid_node() {
        let mailboxes = MailboxArray::<u64>::create(2, 4).unwrap();
        assert_eq!(mailboxes.send(5, 1), SendOutcome::InvalidNode);
    }

    #[test]
    fn send_to_full_mailbox_reports_congested() {
        // Capacity 2 holds exactly two in-flight messages; a third send
        // finds the ring full.
        let mailboxes = MailboxArray::<u64>::create(1, 2).unwrap();
        assert_eq!(mailboxes.send(0, 1), SendOutcome::Delivered);
        assert_eq!(mailboxes.send(0, 2), SendOutcome::Delivered);
        assert_eq!(mailboxes.send(0, 3), SendOutcome::Congested);
    }

    #[test]
    fn scenario_cross_node_messaging_preserves_order() {
        // A producer sends 2000 monotonically increasing integers to node
        // 1; a consumer on node 1 drains them via process_local and
        // observes them in order.
        let mailboxes = MailboxArray::<u64>::create(2, 4096).unwrap();
        for i in 0..2000u64 {
            assert_eq!(mailboxes.send(1, i), SendOutcome::Delivered);
        }

        let mut received = Vec::new();
        let processed = mailboxes.process_local(1, |msg| received.push(msg), 0);
        assert_eq!(processed, 2000);
        assert_eq!(received, (0..2000u64).collect::<Vec<_>>());
    }

    #[test]
    fn process_local_respects_limit() {
        let mailboxes = MailboxArray::<u64>::create(1, 64).unwrap();
        for i in 0..10u64 {
            mailboxes.send(0, i);
        }
        let mut received = Vec::new();
        let processed = mailboxes.process_local(0, |msg| received.push(msg), 3);
        assert_eq!(processed, 3);
        assert_eq!(received, vec![0, 1, 2]);
    }
}
