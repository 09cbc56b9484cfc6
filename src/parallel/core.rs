use crate::error::Result;
use crate::settings::{ExecutionSettings, validate_worker_count};

/// Upper bound for automatically chosen chunk sizes
const MAX_AUTO_CHUNK: usize = 64;

/// Execution strategy for one sweep: serial in the calling thread, or
/// parallel on a pool of `workers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    Serial,
    Parallel { workers: usize },
}

impl ExecutionStrategy {
    /// Resolve the effective worker count for a sweep.
    ///
    /// An explicit `num_cpus` overrides the settings default for this call
    /// only. An explicit zero is a configuration error raised before any work
    /// starts; it is never replaced by the default.
    ///
    /// ```rust
    /// use qsweep::parallel::ExecutionStrategy;
    /// use qsweep::settings::{Backend, ExecutionSettings};
    ///
    /// let settings = ExecutionSettings::new(4, Backend::Robust)?;
    /// assert_eq!(
    ///     ExecutionStrategy::resolve(None, &settings)?,
    ///     ExecutionStrategy::Parallel { workers: 4 }
    /// );
    /// assert_eq!(ExecutionStrategy::resolve(Some(1), &settings)?, ExecutionStrategy::Serial);
    /// assert!(ExecutionStrategy::resolve(Some(0), &settings).is_err());
    /// # Ok::<(), qsweep::SweepError>(())
    /// ```
    pub fn resolve(num_cpus: Option<usize>, settings: &ExecutionSettings) -> Result<Self> {
        let workers = match num_cpus {
            Some(requested) => validate_worker_count(requested)?,
            None => settings.default_worker_count(),
        };

        Ok(if workers <= 1 {
            ExecutionStrategy::Serial
        } else {
            ExecutionStrategy::Parallel { workers }
        })
    }

    pub fn workers(&self) -> usize {
        match self {
            ExecutionStrategy::Serial => 1,
            ExecutionStrategy::Parallel { workers } => *workers,
        }
    }

    pub fn is_parallel(&self) -> bool {
        matches!(self, ExecutionStrategy::Parallel { .. })
    }

    /// Points per pool job: the configured size, or an automatic one when
    /// the configured size is 0.
    pub fn chunk_size(&self, total_points: usize, configured: usize) -> usize {
        if configured > 0 {
            configured
        } else {
            auto_chunk_size(total_points, self.workers())
        }
    }
}

/// Roughly four jobs per worker, clamped to `1..=64` points per job.
pub fn auto_chunk_size(total_points: usize, workers: usize) -> usize {
    (total_points / (workers.max(1) * 4)).clamp(1, MAX_AUTO_CHUNK)
}
