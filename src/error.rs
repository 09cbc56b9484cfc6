//! Error taxonomy for sweep configuration, pool management and task execution.

use crate::grid::GridPoint;
use crate::settings::Backend;

/// Errors surfaced synchronously to the caller of a sweep.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    /// Invalid settings value, worker count or grid definition.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The pool for the requested worker count and backend could not be created.
    #[error("failed to create {backend} pool with {workers} workers: {reason}")]
    PoolCreation {
        backend: Backend,
        workers: usize,
        reason: String,
    },

    /// An evaluation raised (or its worker panicked). No partial results are returned.
    #[error("task failed at grid point {point} ({failures} failed in total): {source}")]
    Task {
        point: Box<GridPoint>,
        failures: usize,
        #[source]
        source: anyhow::Error,
    },

    /// The evaluator, its context or its result could not cross the
    /// multiprocessing backend's serialization boundary.
    #[error("{}", serialization_message(.point, .reason))]
    Serialization {
        point: Option<Box<GridPoint>>,
        reason: String,
    },

    /// Result reassembly invariant violated.
    #[error("result collection error: {0}")]
    Collection(String),
}

fn serialization_message(point: &Option<Box<GridPoint>>, reason: &str) -> String {
    match point {
        Some(point) => format!("serialization failed at grid point {point}: {reason}"),
        None => format!("serialization failed: {reason}"),
    }
}

impl SweepError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        SweepError::Configuration(message.into())
    }

    /// Grid point of a failed task, if this error names one.
    pub fn failed_point(&self) -> Option<&GridPoint> {
        match self {
            SweepError::Task { point, .. } => Some(point),
            SweepError::Serialization { point, .. } => point.as_deref(),
            _ => None,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, SweepError::Configuration(_))
    }

    /// True for failures a caller can usually fix by switching to the robust backend.
    pub fn is_serialization(&self) -> bool {
        matches!(self, SweepError::Serialization { .. })
    }
}

pub type Result<T, E = SweepError> = std::result::Result<T, E>;
