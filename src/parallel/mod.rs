//! Worker pools and the policy that drives them.
//!
//! # Architecture Responsibilities
//!
//! The parallel module owns **system resources** and **execution strategy**:
//!
//! ## What This Module Does:
//! - **Strategy**: Resolves serial vs parallel execution from the per-call worker
//!   count and the settings default
//! - **Backend Adapter**: One `parallel_map` over the `multiprocessing` and
//!   `robust-pickling` pool implementations
//! - **Pool Lifecycle**: Creates, reuses, replaces and tears down the shared pool
//! - **Progress**: Optional progress bar over collected reports
//!
//! ## What This Module Does NOT Do:
//! - **Evaluation**: Knows nothing about what a grid point means
//! - **Result Layout**: Reports carry grid indices; placing them is the sweep's job
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────┐    ┌─────────────────┐
//! │   Sweep         │    │   Parallel       │    │   Worker        │
//! │   Dispatcher    │───▶│   Module         │───▶│   Threads       │
//! │                 │    │                  │    │                 │
//! │ • Grid points   │    │ • Strategy       │    │ • Native queue  │
//! │ • Result buffer │    │ • Pool manager   │    │ • Rayon pool    │
//! │ • Failures      │    │ • parallel_map   │    │                 │
//! └─────────────────┘    └──────────────────┘    └─────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust
//! use qsweep::parallel::{PoolKey, PoolManager};
//! use qsweep::settings::Backend;
//!
//! let manager = PoolManager::new();
//! let key = PoolKey::new(2, Backend::Robust);
//!
//! let pool = manager.acquire(key, false)?;
//! assert_eq!(pool.workers(), 2);
//!
//! // Same key, same pool
//! manager.acquire(key, false)?;
//! assert_eq!(manager.pools_created(), 1);
//! # Ok::<(), qsweep::SweepError>(())
//! ```

pub mod backend;
pub mod core;
pub mod pool;
pub mod progress;

pub use self::backend::{PoolKey, TaskStream, WorkerPool};
pub use self::core::{ExecutionStrategy, auto_chunk_size};
pub use self::pool::{PoolManager, PoolState};
pub use self::progress::SweepProgress;
