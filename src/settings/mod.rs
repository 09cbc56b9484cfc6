//! Execution settings and the process-wide settings singleton.
//!
//! Sweeps take an [`ExecutionSettings`] by reference. The singleton below
//! exists for callers that want the "assign once, applies to the next sweep"
//! ergonomics: [`crate::sweep`] and [`crate::SweepDispatcher::global`] take a
//! fresh snapshot of it at the start of every sweep, so nothing is cached
//! across calls.
//!
//! ```rust
//! use qsweep::settings::{self, Backend};
//!
//! settings::update(|s| {
//!     s.set_default_worker_count(4)?;
//!     s.set_backend(Backend::Robust);
//!     Ok(())
//! })?;
//! assert_eq!(settings::current().default_worker_count(), 4);
//!
//! // Rejected updates leave the previous values in place
//! assert!(settings::set_default_worker_count(0).is_err());
//! assert_eq!(settings::current().default_worker_count(), 4);
//! # settings::reset();
//! # Ok::<(), qsweep::SweepError>(())
//! ```

pub mod core;
pub mod load;

use std::sync::LazyLock;

use parking_lot::RwLock;

use crate::error::Result;

pub use self::core::{Backend, ExecutionSettings, validate_worker_count};
pub use self::load::{CONFIG_FILE, ENV_PREFIX};

static SETTINGS: LazyLock<RwLock<ExecutionSettings>> =
    LazyLock::new(|| RwLock::new(ExecutionSettings::default()));

/// Snapshot of the process-wide settings.
pub fn current() -> ExecutionSettings {
    SETTINGS.read().clone()
}

/// Apply `f` to a copy of the process-wide settings and commit the copy only
/// if `f` succeeds.
pub fn update<F>(f: F) -> Result<()>
where
    F: FnOnce(&mut ExecutionSettings) -> Result<()>,
{
    let mut guard = SETTINGS.write();
    let mut staged = guard.clone();
    f(&mut staged)?;
    *guard = staged;
    Ok(())
}

/// Replace the process-wide settings wholesale.
pub fn init(settings: ExecutionSettings) {
    tracing::debug!(
        "installing settings: {} workers, {} backend",
        settings.default_worker_count(),
        settings.backend()
    );
    *SETTINGS.write() = settings;
}

/// Restore the process-wide settings to their startup defaults.
pub fn reset() {
    init(ExecutionSettings::default());
}

pub fn set_default_worker_count<N>(count: N) -> Result<()>
where
    N: TryInto<usize> + Copy + std::fmt::Display,
{
    update(|s| s.set_default_worker_count(count))
}

pub fn set_backend(backend: Backend) {
    SETTINGS.write().set_backend(backend);
}
