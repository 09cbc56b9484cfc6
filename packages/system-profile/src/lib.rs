//! System Profile Crate
//!
//! Provides cached core counts and the arithmetic used to split them between
//! worker pools and the numeric kernels running inside each worker.
//! All values are computed once on first access and cached for the program lifetime.
//!
//! Uses std::sync::LazyLock (Rust 1.80+) for lazy initialization.

use std::sync::{Arc, LazyLock};

/// Global system profile instance - computed once, cached forever
pub static SYSTEM: LazyLock<Arc<SystemProfile>> =
    LazyLock::new(|| Arc::new(SystemProfile::detect()));

/// Core counts that bound process-level and thread-level parallelism
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemProfile {
    /// Total CPU cores (including hyperthreading)
    pub cpu_count: usize,

    /// Physical CPU cores (excluding hyperthreading)
    pub physical_cpu_count: usize,
}

impl SystemProfile {
    /// Detect system profile (called once via LazyLock)
    fn detect() -> Self {
        Self::with_counts(num_cpus::get(), num_cpus::get_physical())
    }

    /// Build a profile from explicit counts. Zero counts are raised to one.
    pub fn with_counts(cpu_count: usize, physical_cpu_count: usize) -> Self {
        let cpu_count = cpu_count.max(1);
        Self {
            cpu_count,
            physical_cpu_count: physical_cpu_count.clamp(1, cpu_count),
        }
    }

    /// Get the global system profile instance
    pub fn get() -> Arc<SystemProfile> {
        SYSTEM.clone()
    }

    /// Numeric-library threads each worker may use so that
    /// `workers * threads_per_worker` stays within the logical core count.
    pub fn threads_per_worker(&self, workers: usize) -> usize {
        (self.cpu_count / workers.max(1)).max(1)
    }

    /// Whether `workers` pool workers, each running `threads_per_worker`
    /// kernel threads, fit on this machine without oversubscription.
    pub fn fits(&self, workers: usize, threads_per_worker: usize) -> bool {
        workers.saturating_mul(threads_per_worker.max(1)) <= self.cpu_count
    }

    /// Get a human-readable summary of system resources
    pub fn summary(&self) -> String {
        format!(
            "CPUs: {} ({} physical)",
            self.cpu_count, self.physical_cpu_count
        )
    }
}

/// Quick access functions
impl SystemProfile {
    /// Get CPU count directly
    pub fn cpu_count() -> usize {
        SYSTEM.cpu_count
    }

    /// Get physical CPU count directly
    pub fn physical_cpu_count() -> usize {
        SYSTEM.physical_cpu_count
    }

    /// Check if running on a multi-core system
    pub fn is_multicore() -> bool {
        SYSTEM.cpu_count > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_profile_initialization() {
        let profile = SystemProfile::get();
        assert!(profile.cpu_count > 0);
        assert!(profile.physical_cpu_count > 0);
        assert!(profile.physical_cpu_count <= profile.cpu_count);
    }

    #[test]
    fn test_threads_per_worker() {
        let profile = SystemProfile::with_counts(8, 4);

        assert_eq!(profile.threads_per_worker(1), 8);
        assert_eq!(profile.threads_per_worker(4), 2);
        assert_eq!(profile.threads_per_worker(3), 2);
        // More workers than cores still leaves one thread each
        assert_eq!(profile.threads_per_worker(16), 1);
        // Zero workers is treated as one
        assert_eq!(profile.threads_per_worker(0), 8);
    }

    #[test]
    fn test_fits() {
        let profile = SystemProfile::with_counts(8, 8);

        assert!(profile.fits(4, 2));
        assert!(profile.fits(8, 1));
        assert!(!profile.fits(4, 4));
        assert!(!profile.fits(9, 1));
        assert!(!profile.fits(usize::MAX, 2));
    }

    #[test]
    fn test_zero_counts_are_clamped() {
        let profile = SystemProfile::with_counts(0, 0);
        assert_eq!(profile.cpu_count, 1);
        assert_eq!(profile.physical_cpu_count, 1);

        let profile = SystemProfile::with_counts(4, 16);
        assert_eq!(profile.physical_cpu_count, 4);
    }

    #[test]
    fn test_static_access() {
        let profile1 = SystemProfile::get();
        let profile2 = SystemProfile::get();
        assert_eq!(profile1.cpu_count, profile2.cpu_count);

        assert_eq!(SystemProfile::cpu_count(), profile1.cpu_count);
        assert_eq!(SystemProfile::physical_cpu_count(), profile1.physical_cpu_count);
        assert_eq!(SystemProfile::is_multicore(), profile1.cpu_count > 1);
    }

    #[test]
    fn test_summary() {
        let profile = SystemProfile::with_counts(8, 4);
        assert_eq!(profile.summary(), "CPUs: 8 (4 physical)");
    }
}
