//! Migration advisor stub: the seam a future counter-based rebalancer
//! would plug into. No working rebalancer exists yet, so this stays an
//! honest stub rather than inventing logic with nothing backing it.

/// Outcome of an advisor check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvisorVerdict {
    /// No rebalancing recommended.
    Stay,
    /// Caller should consider migrating the current thread to another
    /// node.
    Migrate(usize),
    /// The advisor has no usable capability (no hardware-counter sampling
    /// compiled in) and cannot render a verdict.
    Error,
}

/// Placeholder for a background thread-migration advisor. Real
/// rebalancing needs hardware performance-counter sampling
/// (`perf_event_open`), which is out of scope here — this is the
/// "missing capability" case from spec.md §7: the advisor degrades
/// gracefully rather than panicking, but it genuinely cannot recommend
/// anything, so `start` reports failure and `check` always reports
/// [`AdvisorVerdict::Error`].
pub struct MigrationAdvisor {
    threshold_mpki: f64,
}

impl Default for MigrationAdvisor {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationAdvisor {
    /// Default remote-access threshold, misses per thousand instructions.
    pub const DEFAULT_THRESHOLD_MPKI: f64 = 50.0;

    pub fn new() -> Self {
        Self { threshold_mpki: Self::DEFAULT_THRESHOLD_MPKI }
    }

    /// Starts the advisor. Always reports failure (`false`): no
    /// hardware-counter backend is implemented, so there is nothing to
    /// start. Exists so callers can treat the advisor's lifecycle
    /// uniformly with the rest of the runtime.
    pub fn start(&self) -> bool {
        false
    }

    /// Configures the remote-access threshold above which migration would
    /// be recommended, once this is implemented.
    pub fn set_threshold(&mut self, mpki: f64) {
        self.threshold_mpki = mpki;
    }

    /// Current threshold.
    pub fn threshold(&self) -> f64 {
        self.threshold_mpki
    }

    /// Always [`AdvisorVerdict::Error`]: no hardware-counter sampling is
    /// implemented, so the advisor has no basis for a `Stay`/`Migrate`
    /// verdict.
    pub fn check(&self) -> AdvisorVerdict {
        AdvisorVerdict::Error
    }
}
