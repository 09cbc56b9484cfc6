use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SweepError};

/// Parallel-map implementation backing a worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Backend {
    /// Persistent worker threads behind a bincode serialization boundary.
    /// Only named functions can be transmitted.
    #[serde(rename = "multiprocessing")]
    Native,
    /// Dedicated rayon pool accepting arbitrary closures.
    #[default]
    #[serde(rename = "robust-pickling")]
    Robust,
}

impl Backend {
    pub const ALL: [Backend; 2] = [Backend::Native, Backend::Robust];

    /// Configuration identifier.
    pub const fn id(self) -> &'static str {
        match self {
            Backend::Native => "multiprocessing",
            Backend::Robust => "robust-pickling",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Backend {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "multiprocessing" | "native" => Ok(Backend::Native),
            "robust-pickling" | "robust" => Ok(Backend::Robust),
            other => Err(SweepError::config(format!(
                "unknown backend '{other}' (expected 'multiprocessing' or 'robust-pickling')"
            ))),
        }
    }
}

/// How sweeps are executed: default worker count, backend and the knobs around them.
///
/// Fields are private so every mutation goes through a validating setter; a
/// rejected value leaves the previous one in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionSettings {
    default_worker_count: usize,
    backend: Backend,
    chunk_size: usize,
    show_progress: bool,
    enforce_core_limit: bool,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            default_worker_count: 1,
            backend: Backend::default(),
            chunk_size: 1,
            show_progress: false,
            enforce_core_limit: true,
        }
    }
}

impl ExecutionSettings {
    pub fn new(default_worker_count: usize, backend: Backend) -> Result<Self> {
        let mut settings = Self::default();
        settings.set_default_worker_count(default_worker_count)?;
        settings.set_backend(backend);
        Ok(settings)
    }

    pub fn default_worker_count(&self) -> usize {
        self.default_worker_count
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Points per pool job; 0 means pick automatically.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn show_progress(&self) -> bool {
        self.show_progress
    }

    /// Whether asking for more workers than logical cores fails pool
    /// creation. On by default; when off, oversubscription is only logged.
    pub fn enforce_core_limit(&self) -> bool {
        self.enforce_core_limit
    }

    /// Set the worker count used when a sweep gives no `num_cpus`.
    /// Zero and negative counts are rejected.
    pub fn set_default_worker_count<N>(&mut self, count: N) -> Result<()>
    where
        N: TryInto<usize> + Copy + fmt::Display,
    {
        self.default_worker_count = validate_worker_count(count)?;
        Ok(())
    }

    pub fn set_backend(&mut self, backend: Backend) {
        self.backend = backend;
    }

    /// Parse and set the backend from its identifier.
    pub fn set_backend_id(&mut self, id: &str) -> Result<()> {
        self.backend = id.parse()?;
        Ok(())
    }

    pub fn set_chunk_size(&mut self, chunk_size: usize) {
        self.chunk_size = chunk_size;
    }

    pub fn set_show_progress(&mut self, show_progress: bool) {
        self.show_progress = show_progress;
    }

    pub fn set_enforce_core_limit(&mut self, enforce: bool) {
        self.enforce_core_limit = enforce;
    }
}

/// Validate a worker count: it must convert to `usize` and be at least one.
pub fn validate_worker_count<N>(count: N) -> Result<usize>
where
    N: TryInto<usize> + Copy + fmt::Display,
{
    match count.try_into() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(SweepError::config(format!(
            "worker count must be a positive integer, got {count}"
        ))),
    }
}
