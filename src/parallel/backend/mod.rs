//! Backend adapter: one `parallel_map` contract over both pool implementations.
//!
//! The dispatcher only ever talks to [`WorkerPool`]. Each submitted job
//! carries its tasks' grid indices, so reports can arrive in any order and
//! still be placed correctly by the collector.

pub mod native;
pub mod robust;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crossbeam::channel::{Receiver, unbounded};
use serde::Serialize;
use serde::de::DeserializeOwned;
use system_profile::SystemProfile;
use tracing::{info, warn};

use self::native::NativePool;
use self::robust::RobustPool;
use crate::error::{Result, SweepError};
use crate::settings::Backend;
use crate::sweep::task::{EvaluationTask, TaskError, TaskReport};
use crate::thread_budget;

/// Unit of work handed to a pool thread.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Identity of a pool: a pool is only reused for an identical key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub workers: usize,
    pub backend: Backend,
}

impl PoolKey {
    pub fn new(workers: usize, backend: Backend) -> Self {
        Self { workers, backend }
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x {}", self.workers, self.backend)
    }
}

pub enum WorkerPool {
    Native(NativePool),
    Robust(RobustPool),
}

impl WorkerPool {
    /// Create a pool for `key`. More workers than logical cores is refused
    /// when `enforce_core_limit` is set and only warned about otherwise.
    pub fn create(key: PoolKey, enforce_core_limit: bool) -> Result<Self> {
        let creation_error = |reason: String| SweepError::PoolCreation {
            backend: key.backend,
            workers: key.workers,
            reason,
        };

        if key.workers == 0 {
            return Err(creation_error("a pool needs at least one worker".into()));
        }

        let cores = SystemProfile::get().cpu_count;
        if key.workers > cores {
            if enforce_core_limit {
                return Err(creation_error(format!(
                    "{} workers exceed the {} logical cores available",
                    key.workers, cores
                )));
            }
            warn!(
                "requested {} workers on {} logical cores; workers will compete for CPU",
                key.workers, cores
            );
        }
        thread_budget::check_oversubscription(key.workers);

        let pool = match key.backend {
            Backend::Native => WorkerPool::Native(NativePool::spawn(key.workers)?),
            Backend::Robust => WorkerPool::Robust(RobustPool::new(key.workers)?),
        };
        info!("created {} pool with {} workers", key.backend, key.workers);
        Ok(pool)
    }

    pub fn backend(&self) -> Backend {
        match self {
            WorkerPool::Native(_) => Backend::Native,
            WorkerPool::Robust(_) => Backend::Robust,
        }
    }

    pub fn workers(&self) -> usize {
        match self {
            WorkerPool::Native(pool) => pool.workers(),
            WorkerPool::Robust(pool) => pool.workers(),
        }
    }

    pub fn key(&self) -> PoolKey {
        PoolKey::new(self.workers(), self.backend())
    }

    /// Submit every task, `chunk_size` consecutive tasks per job, and return
    /// the stream their reports arrive on. Once `abort` is raised, tasks that
    /// have not started report [`TaskError::Skipped`].
    pub fn parallel_map<C, R>(
        &self,
        tasks: Vec<EvaluationTask<C, R>>,
        chunk_size: usize,
        abort: Arc<AtomicBool>,
    ) -> Result<TaskStream<R>>
    where
        C: Serialize + DeserializeOwned + Send + Sync + 'static,
        R: Serialize + DeserializeOwned + Send + 'static,
    {
        let total = tasks.len();

        match self {
            WorkerPool::Native(pool) => {
                let encoded = native::encode_tasks(tasks)?;
                let (tx, rx) = unbounded();
                for chunk in into_chunks(encoded, chunk_size) {
                    let tx = tx.clone();
                    let abort = Arc::clone(&abort);
                    pool.submit(Box::new(move || {
                        for task in chunk {
                            if tx.send(task.run(&abort)).is_err() {
                                break; // Collector gone
                            }
                        }
                    }))?;
                }
                Ok(TaskStream::new(Channel::Encoded(rx), total))
            }
            WorkerPool::Robust(pool) => {
                let (tx, rx) = unbounded();
                for chunk in into_chunks(tasks, chunk_size) {
                    let tx = tx.clone();
                    let abort = Arc::clone(&abort);
                    pool.submit(Box::new(move || {
                        for task in chunk {
                            if tx.send(task.run(&abort)).is_err() {
                                break;
                            }
                        }
                    }))?;
                }
                Ok(TaskStream::new(Channel::Direct(rx), total))
            }
        }
    }

    /// Join the workers once their queued jobs have run.
    pub fn shutdown(self) {
        match self {
            WorkerPool::Native(pool) => pool.shutdown(),
            WorkerPool::Robust(pool) => pool.shutdown(),
        }
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("backend", &self.backend())
            .field("workers", &self.workers())
            .finish()
    }
}

fn into_chunks<T>(items: Vec<T>, chunk_size: usize) -> Vec<Vec<T>> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::with_capacity(items.len().div_ceil(chunk_size));
    let mut items = items.into_iter().peekable();
    while items.peek().is_some() {
        chunks.push(items.by_ref().take(chunk_size).collect());
    }
    chunks
}

enum Channel<R> {
    Direct(Receiver<TaskReport<R>>),
    Encoded(Receiver<TaskReport<Vec<u8>>>),
}

/// Reports of one `parallel_map` call, in completion order.
///
/// Ends after one report per submitted task, or early if every worker-side
/// sender is gone; [`TaskStream::remaining`] tells the two apart.
pub struct TaskStream<R> {
    channel: Channel<R>,
    remaining: usize,
}

impl<R> TaskStream<R> {
    fn new(channel: Channel<R>, total: usize) -> Self {
        Self {
            channel,
            remaining: total,
        }
    }

    /// Reports not yet received.
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl<R: DeserializeOwned> Iterator for TaskStream<R> {
    type Item = TaskReport<R>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let report = match &self.channel {
            Channel::Direct(rx) => rx.recv().ok()?,
            Channel::Encoded(rx) => {
                let report = rx.recv().ok()?;
                TaskReport {
                    index: report.index,
                    outcome: report.outcome.and_then(|bytes| {
                        bincode::deserialize(&bytes).map_err(|e| {
                            TaskError::Serialization(format!("result decoding: {e}"))
                        })
                    }),
                }
            }
        };

        self.remaining -= 1;
        Some(report)
    }
}
