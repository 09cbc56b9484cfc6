//! Lifecycle of the single shared worker pool.
//!
//! ```text
//! Absent ──acquire(k)──▶ Ready(k) ──acquire(k)──▶ Ready(k)      (reuse)
//!                           │
//!                           ├──acquire(k')──▶ Ready(k')          (replace)
//!                           └──teardown()──▶ Absent
//! any ──creation error──▶ Failed(k)
//! ```

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::backend::{PoolKey, WorkerPool};
use crate::error::Result;

static GLOBAL_POOLS: LazyLock<PoolManager> = LazyLock::new(PoolManager::new);

/// Observable state of the managed slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Absent,
    Ready(PoolKey),
    Failed(PoolKey),
}

struct Slot {
    pool: Option<Arc<WorkerPool>>,
    state: PoolState,
}

/// Owns at most one pool at a time and hands out shared references to it.
///
/// Concurrent sweeps asking for the same key share the pool. A sweep holding
/// a pool keeps it alive even if the manager replaces or tears it down; the
/// workers are released when the last holder drops it.
pub struct PoolManager {
    slot: Mutex<Slot>,
    created: AtomicUsize,
}

impl PoolManager {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                pool: None,
                state: PoolState::Absent,
            }),
            created: AtomicUsize::new(0),
        }
    }

    /// The process-wide manager used by [`crate::sweep`].
    pub fn global() -> &'static PoolManager {
        &GLOBAL_POOLS
    }

    /// Get the pool for `key`, creating it or replacing a pool with a
    /// different key. Creation failures are returned as-is; no other worker
    /// count or backend is tried.
    ///
    /// A replaced pool is retired after the slot is unlocked, so jobs still
    /// draining on it can query the manager.
    pub fn acquire(&self, key: PoolKey, enforce_core_limit: bool) -> Result<Arc<WorkerPool>> {
        loop {
            let mut slot = self.slot.lock();

            let previous = match slot.pool.take() {
                Some(pool) if pool.key() == key => {
                    debug!("reusing {key} pool");
                    slot.pool = Some(Arc::clone(&pool));
                    return Ok(pool);
                }
                Some(pool) => pool,
                None => return self.create(&mut slot, key, enforce_core_limit),
            };

            slot.state = PoolState::Absent;
            drop(slot);

            info!("replacing {} pool with {key}", previous.key());
            retire(previous);
        }
    }

    fn create(
        &self,
        slot: &mut Slot,
        key: PoolKey,
        enforce_core_limit: bool,
    ) -> Result<Arc<WorkerPool>> {
        match WorkerPool::create(key, enforce_core_limit) {
            Ok(pool) => {
                let pool = Arc::new(pool);
                self.created.fetch_add(1, Ordering::Relaxed);
                slot.pool = Some(Arc::clone(&pool));
                slot.state = PoolState::Ready(key);
                Ok(pool)
            }
            Err(e) => {
                warn!("pool creation failed for {key}: {e}");
                slot.state = PoolState::Failed(key);
                Err(e)
            }
        }
    }

    /// Release the managed pool. Returns whether there was one.
    pub fn teardown(&self) -> bool {
        let pool = {
            let mut slot = self.slot.lock();
            slot.state = PoolState::Absent;
            slot.pool.take()
        };
        match pool {
            Some(pool) => {
                debug!("tearing down {} pool", pool.key());
                retire(pool);
                true
            }
            None => false,
        }
    }

    /// Release the managed pool only if it still has `key`.
    pub fn teardown_key(&self, key: PoolKey) -> bool {
        let pool = {
            let mut slot = self.slot.lock();
            if slot.state != PoolState::Ready(key) {
                return false;
            }
            slot.state = PoolState::Absent;
            slot.pool.take()
        };
        match pool {
            Some(pool) => {
                debug!("tearing down {key} pool after a failed sweep");
                retire(pool);
                true
            }
            None => false,
        }
    }

    pub fn state(&self) -> PoolState {
        self.slot.lock().state
    }

    /// Number of pools created so far.
    pub fn pools_created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for PoolManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolManager")
            .field("state", &self.state())
            .field("pools_created", &self.pools_created())
            .finish()
    }
}

impl Default for PoolManager {
    fn default() -> Self {
        Self::new()
    }
}

fn retire(pool: Arc<WorkerPool>) {
    match Arc::try_unwrap(pool) {
        Ok(pool) => pool.shutdown(),
        Err(shared) => debug!(
            "{} pool still in use by {} sweeps; released when they finish",
            shared.key(),
            Arc::strong_count(&shared) - 1
        ),
    }
}
