//! The `robust-pickling` backend: a dedicated rayon pool that runs arbitrary
//! closures without any encoding step.

use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use super::Job;
use crate::error::{Result, SweepError};
use crate::settings::Backend;

/// A rayon pool whose worker threads are spawned, and therefore joined, by us.
pub struct RobustPool {
    pool: Option<rayon::ThreadPool>,
    handles: Vec<JoinHandle<()>>,
    workers: usize,
}

impl RobustPool {
    pub fn new(workers: usize) -> Result<Self> {
        let mut handles = Vec::with_capacity(workers);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .spawn_handler(|worker| {
                let handle = thread::Builder::new()
                    .name(format!("qsweep-robust-{}", worker.index()))
                    .spawn(move || worker.run())?;
                handles.push(handle);
                Ok(())
            })
            .build()
            .map_err(|e| SweepError::PoolCreation {
                backend: Backend::Robust,
                workers,
                reason: e.to_string(),
            })?;

        Ok(Self {
            pool: Some(pool),
            handles,
            workers,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn submit(&self, job: Job) -> Result<()> {
        self.pool
            .as_ref()
            .ok_or_else(|| SweepError::Collection("robust pool is shut down".into()))?
            .spawn(job);
        Ok(())
    }

    /// Terminate the pool and join every worker. Spawned jobs finish first.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        // Dropping the rayon handle lets the workers leave their main loop
        if self.pool.take().is_none() {
            return;
        }
        let current = thread::current().id();
        for handle in self.handles.drain(..) {
            // A worker releasing its own pool cannot join itself
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!("robust worker exited abnormally");
            }
        }
        debug!("robust pool with {} workers joined", self.workers);
    }
}

impl Drop for RobustPool {
    fn drop(&mut self) {
        self.close();
    }
}
