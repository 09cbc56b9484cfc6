use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use super::buffer::{ResultBuffer, SweepResult};
use super::task::{EvaluationTask, Evaluator, TaskError};
use crate::error::{Result, SweepError};
use crate::grid::{GridPoint, ParameterGrid};
use crate::parallel::{ExecutionStrategy, PoolKey, PoolManager, SweepProgress};
use crate::settings::{self, ExecutionSettings};

/// Drives one sweep at a time: resolves the strategy, fans tasks out to the
/// pool and reassembles results by grid index.
///
/// Settings are copied in at construction, so later changes to the
/// process-wide settings apply to the next dispatcher, never to a running
/// sweep.
#[derive(Debug, Clone)]
pub struct SweepDispatcher<'a> {
    settings: ExecutionSettings,
    pools: &'a PoolManager,
}

impl<'a> SweepDispatcher<'a> {
    pub fn new(settings: &ExecutionSettings, pools: &'a PoolManager) -> Self {
        Self {
            settings: settings.clone(),
            pools,
        }
    }

    pub fn settings(&self) -> &ExecutionSettings {
        &self.settings
    }

    /// Evaluate `evaluator` at every point of `grid`.
    ///
    /// `num_cpus` overrides the default worker count for this call. With one
    /// worker the sweep runs in the calling thread and no pool is touched.
    /// Any failing point fails the whole sweep; no partial results are
    /// returned.
    pub fn run<C, R>(
        &self,
        grid: &ParameterGrid,
        evaluator: &Evaluator<C, R>,
        context: C,
        num_cpus: Option<usize>,
    ) -> Result<SweepResult<R>>
    where
        C: Serialize + DeserializeOwned + Send + Sync + 'static,
        R: Serialize + DeserializeOwned + Send + 'static,
    {
        let strategy = ExecutionStrategy::resolve(num_cpus, &self.settings)?;
        let mut buffer = ResultBuffer::new(grid);
        if grid.is_empty() {
            debug!("empty grid, nothing to evaluate");
            return buffer.finish();
        }

        debug!(
            "sweeping {} points with {:?} on {} backend",
            grid.len(),
            strategy,
            self.settings.backend()
        );

        let context = Arc::new(context);
        let progress = SweepProgress::new(grid.len(), self.settings.show_progress());

        match strategy {
            ExecutionStrategy::Serial => {
                self.run_serial(grid, evaluator, &context, &mut buffer, &progress)?
            }
            ExecutionStrategy::Parallel { workers } => self.run_parallel(
                grid,
                evaluator,
                &context,
                strategy.chunk_size(grid.len(), self.settings.chunk_size()),
                PoolKey::new(workers, self.settings.backend()),
                &mut buffer,
                &progress,
            )?,
        }

        progress.finish();
        buffer.finish()
    }

    fn run_serial<C, R>(
        &self,
        grid: &ParameterGrid,
        evaluator: &Evaluator<C, R>,
        context: &Arc<C>,
        buffer: &mut ResultBuffer<R>,
        progress: &SweepProgress,
    ) -> Result<()> {
        let abort = AtomicBool::new(false);

        for point in grid.points() {
            let report =
                EvaluationTask::new(point, evaluator.clone(), Arc::clone(context)).run(&abort);
            progress.inc();

            match report.outcome {
                Ok(value) => buffer.write(report.index, value)?,
                Err(e) => {
                    let point = point_at(grid, report.index)?;
                    error!("evaluation failed at {point}: {e}");
                    return Err(e.into_sweep_error(point, 1));
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn run_parallel<C, R>(
        &self,
        grid: &ParameterGrid,
        evaluator: &Evaluator<C, R>,
        context: &Arc<C>,
        chunk_size: usize,
        key: PoolKey,
        buffer: &mut ResultBuffer<R>,
        progress: &SweepProgress,
    ) -> Result<()>
    where
        C: Serialize + DeserializeOwned + Send + Sync + 'static,
        R: Serialize + DeserializeOwned + Send + 'static,
    {
        let pool = self.pools.acquire(key, self.settings.enforce_core_limit())?;

        let tasks: Vec<_> = grid
            .points()
            .map(|point| EvaluationTask::new(point, evaluator.clone(), Arc::clone(context)))
            .collect();

        let abort = Arc::new(AtomicBool::new(false));
        let mut stream = pool.parallel_map(tasks, chunk_size, Arc::clone(&abort))?;
        drop(pool);

        // Barrier: every submitted task reports before anything is decided
        let mut failures: Vec<(usize, TaskError)> = Vec::new();
        let mut skipped = 0;
        for report in stream.by_ref() {
            progress.inc();
            match report.outcome {
                Ok(value) => buffer.write(report.index, value)?,
                Err(TaskError::Skipped) => skipped += 1,
                Err(e) => {
                    warn!("task {} failed: {e}", report.index);
                    failures.push((report.index, e));
                }
            }
        }

        if stream.remaining() > 0 {
            self.pools.teardown_key(key);
            return Err(SweepError::Collection(format!(
                "worker channel closed with {} of {} reports outstanding",
                stream.remaining(),
                grid.len()
            )));
        }

        let failed = failures.len();
        let Some((index, first)) = failures.into_iter().min_by_key(|(index, _)| *index) else {
            return Ok(());
        };

        error!("{failed} tasks failed, {skipped} skipped; tearing down {key} pool");
        self.pools.teardown_key(key);
        Err(first.into_sweep_error(point_at(grid, index)?, failed))
    }
}

impl SweepDispatcher<'static> {
    /// Dispatcher over a snapshot of the process-wide settings and the
    /// process-wide pool manager.
    pub fn global() -> Self {
        Self {
            settings: settings::current(),
            pools: PoolManager::global(),
        }
    }
}

fn point_at(grid: &ParameterGrid, index: usize) -> Result<GridPoint> {
    grid.point(index)
        .ok_or_else(|| SweepError::Collection(format!("report for unknown grid index {index}")))
}
