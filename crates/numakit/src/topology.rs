//! `TopologyView`: the only way the rest of the crate learns about node
//! count, per-node CPU sets, and pairwise node distances. Discovering this
//! information from real hardware (hwloc, sysfs) is out of scope — the
//! crate only consumes a resolved view.

/// Resolved, immutable-after-init NUMA topology.
///
/// Implementations must uphold: `node_count() >= 1`; `distance(a, b)` is
/// non-negative, symmetric, zero on the diagonal, and monotone (smaller
/// means closer). A UMA host is represented as a single node owning every
/// CPU, all distances zero.
pub trait TopologyView: Send + Sync {
    /// Number of NUMA nodes, `N >= 1`.
    fn node_count(&self) -> usize;

    /// The CPU indices belonging to `node`.
    fn cpus_of(&self, node: usize) -> &[usize];

    /// Pairwise node distance; non-negative, symmetric, zero on the
    /// diagonal, monotone (smaller = closer).
    fn distance(&self, a: usize, b: usize) -> u32;

    /// Total CPUs across all nodes.
    fn total_cpus(&self) -> usize {
        (0..self.node_count()).map(|n| self.cpus_of(n).len()).sum()
    }
}

/// A simple, explicitly constructed topology, useful both as the UMA
/// single-node fallback and as a test double with an arbitrary distance
/// matrix.
#[derive(Debug, Clone)]
pub struct StaticTopology {
    cpus_by_node: Vec<Vec<usize>>,
    distances: Vec<Vec<u32>>,
}

impl StaticTopology {
    /// Builds a topology from explicit per-node CPU sets and a full
    /// `N x N` distance matrix. Panics if the matrix isn't square, isn't
    /// symmetric, or has a non-zero diagonal — these are programmer
    /// errors in test setup, not runtime conditions.
    pub fn new(cpus_by_node: Vec<Vec<usize>>, distances: Vec<Vec<u32>>) -> Self {
        let n = cpus_by_node.len();
        assert_eq!(distances.len(), n, "distance matrix row count must match node count");
        for (i, row) in distances.iter().enumerate() {
            assert_eq!(row.len(), n, "distance matrix must be square");
            assert_eq!(row[i], 0, "distance({i}, {i}) must be zero");
            for (j, &d) in row.iter().enumerate() {
                assert_eq!(d, distances[j][i], "distance matrix must be symmetric");
            }
        }
        Self { cpus_by_node, distances }
    }

    /// A single-node (UMA) topology owning `cpu_count` CPUs, distance 0.
    pub fn uma(cpu_count: usize) -> Self {
        Self {
            cpus_by_node: vec![(0..cpu_count).collect()],
            distances: vec![vec![0]],
        }
    }

    /// An evenly-spaced ring of `node_count` nodes with `cpus_per_node`
    /// CPUs each: `distance(i, j) = |i - j| * 10`, a common convention in
    /// synthetic topologies (SLIT-style distances are usually multiples
    /// of 10, with 10 on the diagonal; this uses 0 on the diagonal to
    /// keep `distance(n, n) == 0`).
    pub fn synthetic(node_count: usize, cpus_per_node: usize) -> Self {
        let mut next_cpu = 0usize;
        let cpus_by_node = (0..node_count)
            .map(|_| {
                let set: Vec<usize> = (next_cpu..next_cpu + cpus_per_node).collect();
                next_cpu += cpus_per_node;
                set
            })
            .collect();
        let distances = (0..node_count)
            .map(|i| {
                (0..node_count)
                    .map(|j| if i == j { 0 } else { (i.abs_diff(j) as u32) * 10 })
                    .collect()
            })
            .collect();
        Self { cpus_by_node, distances }
    }
}

impl TopologyView for StaticTopology {
    fn node_count(&self) -> usize {
        self.cpus_by_node.len()
    }

    fn cpus_of(&self, node: usize) -> &[usize] {
        &self.cpus_by_node[node]
    }

    fn distance(&self, a: usize, b: usize) -> u32 {
        self.distances[a][b]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uma_has_one_node_and_zero_distance() {
        let t = StaticTopology::uma(8);
        assert_eq!(t.node_count(), 1);
        assert_eq!(t.distance(0, 0), 0);
        assert_eq!(t.cpus_of(0).len(), 8);
    }

    #[test]
    fn synthetic_distance_is_symmetric_and_monotone() {
        let t = StaticTopology::synthetic(4, 2);
        for i in 0..4 {
            for j in 0..4 {
                assert_eq!(t.distance(i, j), t.distance(j, i));
            }
        }
        assert!(t.distance(0, 1) < t.distance(0, 2));
        assert!(t.distance(0, 2) < t.distance(0, 3));
    }
}
