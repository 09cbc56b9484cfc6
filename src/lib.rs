//! # qsweep - Parallel parameter sweeps for quantum-circuit spectra
//!
//! Evaluates an opaque per-point function (a spectrum, a matrix element)
//! across every point of a parameter grid, on a pool of worker threads, and
//! hands back results shaped like the grid.
//!
//! ## Features
//!
//! - **Deterministic Ordering**: Results are placed by grid index, never by completion order
//! - **Two Backends**: `multiprocessing` (bincode boundary, named functions only) and
//!   `robust-pickling` (rayon, any closure, the default)
//! - **Pool Reuse**: One pool per (worker count, backend), shared across sweeps
//! - **Thread Budgeting**: Caps numeric-library threads so workers don't oversubscribe cores
//! - **Layered Config**: Defaults, `qsweep.toml` and `QSWEEP_*` variables via figment
//!
//! ## Quick Start
//!
//! ```rust
//! use qsweep::{Axis, Evaluator, GridPoint, ParameterGrid};
//!
//! fn lowest_levels(point: &GridPoint, scale: &f64) -> anyhow::Result<Vec<f64>> {
//!     let flux = point.get("flux").unwrap_or_default();
//!     Ok((0..3).map(|n| scale * (n as f64 + flux)).collect())
//! }
//!
//! let grid = ParameterGrid::product(vec![
//!     Axis::linspace("flux", 0.0, 0.5, 10),
//!     Axis::new("ng", vec![0.5]),
//! ])?;
//! let evaluator = Evaluator::function("lowest_levels", lowest_levels);
//!
//! // More workers than logical cores is a pool creation error by default
//! let workers = system_profile::SystemProfile::cpu_count().min(4);
//! let spectrum = qsweep::sweep(&grid, &evaluator, 2.0, Some(workers))?;
//! assert_eq!(spectrum.shape(), &[10, 1]);
//! assert_eq!(spectrum.get(&[0, 0]), Some(&vec![0.0, 2.0, 4.0]));
//! # Ok::<(), qsweep::SweepError>(())
//! ```

pub mod error;
pub mod grid;
pub mod logging;
pub mod parallel;
pub mod settings;
pub mod sweep;
pub mod thread_budget;

pub use error::{Result, SweepError};
pub use grid::{Axis, GridPoint, ParameterGrid};
pub use parallel::{PoolKey, PoolManager, PoolState};
pub use settings::{Backend, ExecutionSettings};
pub use sweep::{Evaluator, SweepDispatcher, SweepResult};
pub use thread_budget::ThreadBudget;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run a sweep with the process-wide settings and pool manager.
///
/// Shorthand for [`SweepDispatcher::global`] followed by
/// [`SweepDispatcher::run`]; settings are read fresh on every call.
pub fn sweep<C, R>(
    grid: &ParameterGrid,
    evaluator: &Evaluator<C, R>,
    context: C,
    num_cpus: Option<usize>,
) -> Result<SweepResult<R>>
where
    C: Serialize + DeserializeOwned + Send + Sync + 'static,
    R: Serialize + DeserializeOwned + Send + 'static,
{
    SweepDispatcher::global().run(grid, evaluator, context, num_cpus)
}
