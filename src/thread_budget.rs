//! Caps on the internal thread pools of numeric libraries.
//!
//! Pool workers and the multithreaded kernels they call compete for the same
//! cores. [`ThreadBudget::apply`] writes a single cap into the environment
//! variables those libraries read when they initialize, and configures
//! rayon's global pool the same way.
//!
//! The cap only takes effect if it is applied before the libraries
//! initialize, so call it first thing in `main`, before spawning threads or
//! touching any numeric dependency. Applying it later is silently
//! ineffective; nothing here tries to detect that.
//!
//! ```rust,no_run
//! use qsweep::thread_budget::ThreadBudget;
//!
//! // Four sweep workers, each limited to its share of the machine
//! ThreadBudget::for_workers(4).apply();
//! ```

use std::env;

use system_profile::SystemProfile;
use tracing::{debug, warn};

/// Environment variables that cap numeric-library threads.
pub const THREAD_CAP_VARS: [&str; 6] = [
    "OMP_NUM_THREADS",
    "OPENBLAS_NUM_THREADS",
    "MKL_NUM_THREADS",
    "VECLIB_MAXIMUM_THREADS",
    "NUMEXPR_NUM_THREADS",
    "RAYON_NUM_THREADS",
];

/// Per-process cap on numeric-library threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadBudget {
    threads: usize,
}

impl ThreadBudget {
    /// A cap of `threads` (at least one).
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
        }
    }

    /// The largest cap that keeps `workers` pool workers within the logical
    /// core count.
    pub fn for_workers(workers: usize) -> Self {
        Self::new(SystemProfile::get().threads_per_worker(workers))
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Cap currently in effect, read back from `OMP_NUM_THREADS`.
    pub fn current() -> Option<Self> {
        env::var(THREAD_CAP_VARS[0])
            .ok()
            .and_then(|value| value.trim().parse::<usize>().ok())
            .map(Self::new)
    }

    /// Write the cap into every variable in [`THREAD_CAP_VARS`] and try to
    /// size rayon's global pool. Variables already holding the value are left
    /// untouched, so repeated calls have no further effect.
    pub fn apply(&self) {
        let value = self.threads.to_string();
        let mut changed = 0;

        for var in THREAD_CAP_VARS {
            if env::var(var).is_ok_and(|current| current == value) {
                continue;
            }
            // SAFETY: documented as a startup step that runs before the
            // process spawns threads that could read the environment.
            unsafe { env::set_var(var, &value) };
            changed += 1;
        }

        // Fails once the global pool exists; that is the ineffective-ordering
        // case and stays silent.
        let global = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build_global()
            .is_ok();

        debug!(
            "thread budget {}: {} variables updated, rayon global pool {}",
            self.threads,
            changed,
            if global { "configured" } else { "already initialized" }
        );
    }
}

/// Warn when `workers` pool workers times the active per-worker cap exceeds
/// the logical core count. Without a cap each worker is assumed to use every
/// core.
pub fn check_oversubscription(workers: usize) -> bool {
    let profile = SystemProfile::get();
    let per_worker = ThreadBudget::current()
        .map(|budget| budget.threads())
        .unwrap_or(profile.cpu_count);

    let fits = profile.fits(workers, per_worker);
    if !fits && workers > 1 {
        warn!(
            "{} workers x {} numeric threads oversubscribes {}; \
             call ThreadBudget::for_workers({}).apply() at startup",
            workers,
            per_worker,
            profile.summary(),
            workers
        );
    }
    fits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_is_at_least_one() {
        assert_eq!(ThreadBudget::new(0).threads(), 1);
        assert_eq!(ThreadBudget::new(3).threads(), 3);
    }

    #[test]
    fn test_for_workers_splits_cores() {
        let cores = SystemProfile::cpu_count();
        assert_eq!(ThreadBudget::for_workers(1).threads(), cores);
        assert_eq!(ThreadBudget::for_workers(cores).threads(), 1);
        assert_eq!(ThreadBudget::for_workers(cores * 4).threads(), 1);
    }

    #[test]
    fn test_variable_set_is_fixed() {
        assert!(THREAD_CAP_VARS.contains(&"OMP_NUM_THREADS"));
        assert!(THREAD_CAP_VARS.contains(&"MKL_NUM_THREADS"));
        assert!(THREAD_CAP_VARS.contains(&"RAYON_NUM_THREADS"));
    }
}
