//! The `multiprocessing` backend: persistent worker threads fed through a
//! crossbeam channel, with every task crossing a bincode boundary.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{Receiver, Sender, unbounded};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};

use super::Job;
use crate::error::{Result, SweepError};
use crate::grid::GridPoint;
use crate::settings::Backend;
use crate::sweep::task::{EvalFn, EvaluationTask, TaskError, TaskReport, guarded};

const CLOSURE_REJECTED: &str = "evaluator is a closure and cannot be transmitted to \
     multiprocessing workers; register a named function or use the robust-pickling backend";

/// Fixed set of worker threads pulling jobs from one shared queue.
pub struct NativePool {
    sender: Option<Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
    workers: usize,
}

impl NativePool {
    pub fn spawn(workers: usize) -> Result<Self> {
        let (sender, receiver): (Sender<Job>, Receiver<Job>) = unbounded();
        let mut pool = Self {
            sender: Some(sender),
            handles: Vec::with_capacity(workers),
            workers,
        };

        for worker_id in 0..workers {
            let jobs = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("qsweep-native-{worker_id}"))
                .spawn(move || worker_loop(worker_id, jobs))
                .map_err(|e| SweepError::PoolCreation {
                    backend: Backend::Native,
                    workers,
                    reason: e.to_string(),
                })?;
            pool.handles.push(handle);
        }

        Ok(pool)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn submit(&self, job: Job) -> Result<()> {
        self.sender
            .as_ref()
            .ok_or_else(|| SweepError::Collection("native pool is shut down".into()))?
            .send(job)
            .map_err(|_| SweepError::Collection("native pool workers have exited".into()))
    }

    /// Close the queue and join every worker. Queued jobs are drained first.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if self.sender.take().is_none() {
            return;
        }
        let current = thread::current().id();
        for handle in self.handles.drain(..) {
            // A worker releasing its own pool cannot join itself
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!("native worker exited abnormally");
            }
        }
        debug!("native pool with {} workers joined", self.workers);
    }
}

impl Drop for NativePool {
    fn drop(&mut self) {
        self.close();
    }
}

fn worker_loop(worker_id: usize, jobs: Receiver<Job>) {
    while let Ok(job) = jobs.recv() {
        job();
    }
    trace!("native worker {worker_id} exiting");
}

/// A task after crossing the serialization boundary: only bytes and a plain
/// function pointer travel to the worker.
pub struct NativeTask<C, R> {
    index: usize,
    point: Vec<u8>,
    context: Arc<Vec<u8>>,
    function: EvalFn<C, R>,
}

impl<C, R> NativeTask<C, R>
where
    C: DeserializeOwned,
    R: Serialize,
{
    pub fn index(&self) -> usize {
        self.index
    }

    /// Decode, evaluate and encode the result.
    pub fn run(self, abort: &AtomicBool) -> TaskReport<Vec<u8>> {
        let outcome = guarded(abort, || {
            let point: GridPoint = decode(&self.point, "grid point")?;
            let context: C = decode(&self.context, "context")?;
            let value = (self.function)(&point, &context).map_err(TaskError::Failed)?;
            bincode::serialize(&value)
                .map_err(|e| TaskError::Serialization(format!("result encoding: {e}")))
        });
        TaskReport {
            index: self.index,
            outcome,
        }
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8], what: &str) -> Result<T, TaskError> {
    bincode::deserialize(bytes).map_err(|e| TaskError::Serialization(format!("{what} decoding: {e}")))
}

/// Encode tasks for transmission. Closures are rejected before anything is
/// encoded; the shared context is encoded once and shared by every task.
pub fn encode_tasks<C, R>(tasks: Vec<EvaluationTask<C, R>>) -> Result<Vec<NativeTask<C, R>>>
where
    C: Serialize,
{
    if tasks.iter().any(|task| task.evaluator().as_function().is_none()) {
        return Err(SweepError::Serialization {
            point: None,
            reason: CLOSURE_REJECTED.into(),
        });
    }

    let mut encoded = Vec::with_capacity(tasks.len());
    let mut shared_context: Option<Arc<Vec<u8>>> = None;

    for task in tasks {
        let (point, evaluator, context) = task.into_parts();
        let Some(function) = evaluator.as_function() else {
            continue;
        };

        let context = match &shared_context {
            Some(bytes) => Arc::clone(bytes),
            None => {
                let bytes = Arc::new(bincode::serialize(&*context).map_err(|e| {
                    SweepError::Serialization {
                        point: Some(Box::new(point.clone())),
                        reason: format!("context encoding: {e}"),
                    }
                })?);
                shared_context = Some(Arc::clone(&bytes));
                bytes
            }
        };

        let bytes = bincode::serialize(&point).map_err(|e| SweepError::Serialization {
            point: Some(Box::new(point.clone())),
            reason: format!("grid point encoding: {e}"),
        })?;

        encoded.push(NativeTask {
            index: point.index(),
            point: bytes,
            context,
            function,
        });
    }

    Ok(encoded)
}
