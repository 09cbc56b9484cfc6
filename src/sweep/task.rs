//! Evaluation callables and the per-point tasks built from them.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::SweepError;
use crate::grid::GridPoint;

/// Plain function evaluating one grid point against the shared context.
pub type EvalFn<C, R> = fn(&GridPoint, &C) -> anyhow::Result<R>;

type SharedFn<C, R> = Arc<dyn Fn(&GridPoint, &C) -> anyhow::Result<R> + Send + Sync>;

enum Kind<C, R> {
    Function { name: &'static str, function: EvalFn<C, R> },
    Closure(SharedFn<C, R>),
}

/// The per-point evaluation callable of a sweep.
///
/// A *named function* can be shipped to any backend. A *closure* may capture
/// local state, which the multiprocessing backend cannot transmit; such
/// sweeps need the robust backend or serial execution.
pub struct Evaluator<C, R> {
    kind: Kind<C, R>,
}

impl<C, R> Evaluator<C, R> {
    /// Wrap a plain function under a stable name.
    pub fn function(name: &'static str, function: EvalFn<C, R>) -> Self {
        Self {
            kind: Kind::Function { name, function },
        }
    }

    /// Wrap an arbitrary closure.
    pub fn closure<F>(f: F) -> Self
    where
        F: Fn(&GridPoint, &C) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        Self {
            kind: Kind::Closure(Arc::new(f)),
        }
    }

    /// Name of a function evaluator; `None` for closures.
    pub fn name(&self) -> Option<&'static str> {
        match &self.kind {
            Kind::Function { name, .. } => Some(*name),
            Kind::Closure(_) => None,
        }
    }

    /// The plain function, if this evaluator can cross a serialization boundary.
    pub fn as_function(&self) -> Option<EvalFn<C, R>> {
        match &self.kind {
            Kind::Function { function, .. } => Some(*function),
            Kind::Closure(_) => None,
        }
    }

    pub fn call(&self, point: &GridPoint, context: &C) -> anyhow::Result<R> {
        match &self.kind {
            Kind::Function { function, .. } => function(point, context),
            Kind::Closure(f) => f(point, context),
        }
    }
}

impl<C, R> Clone for Evaluator<C, R> {
    fn clone(&self) -> Self {
        let kind = match &self.kind {
            Kind::Function { name, function } => Kind::Function {
                name: *name,
                function: *function,
            },
            Kind::Closure(f) => Kind::Closure(Arc::clone(f)),
        };
        Self { kind }
    }
}

impl<C, R> fmt::Debug for Evaluator<C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "Evaluator::Function({name})"),
            None => f.write_str("Evaluator::Closure"),
        }
    }
}

// ============================================================================
// Task outcomes
// ============================================================================

/// Why a single task produced no value.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// The evaluation returned an error.
    #[error("{0:#}")]
    Failed(anyhow::Error),
    /// The evaluation panicked on its worker.
    #[error("worker panicked: {0}")]
    Panicked(String),
    /// The point, context or result could not be encoded or decoded.
    #[error("serialization failed: {0}")]
    Serialization(String),
    /// Not started because a sibling task had already failed.
    #[error("skipped after an earlier failure")]
    Skipped,
}

impl TaskError {
    /// Convert into the sweep-level error for `point`.
    pub fn into_sweep_error(self, point: GridPoint, failures: usize) -> SweepError {
        let point = Box::new(point);
        match self {
            TaskError::Failed(source) => SweepError::Task {
                point,
                failures,
                source,
            },
            TaskError::Panicked(message) => SweepError::Task {
                point,
                failures,
                source: anyhow::anyhow!("worker panicked: {message}"),
            },
            TaskError::Serialization(reason) => SweepError::Serialization {
                point: Some(point),
                reason,
            },
            TaskError::Skipped => SweepError::Collection(format!(
                "task at grid point {point} was skipped without a recorded failure"
            )),
        }
    }
}

/// Index-tagged outcome of one task, sent back to the collector.
#[derive(Debug)]
pub struct TaskReport<R> {
    pub index: usize,
    pub outcome: Result<R, TaskError>,
}

/// Run `f` unless `abort` is already raised, converting panics into
/// [`TaskError::Panicked`] and raising `abort` on any failure.
pub(crate) fn guarded<T, F>(abort: &AtomicBool, f: F) -> Result<T, TaskError>
where
    F: FnOnce() -> Result<T, TaskError>,
{
    if abort.load(Ordering::Acquire) {
        return Err(TaskError::Skipped);
    }

    let outcome = panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(TaskError::Panicked(panic_message(payload.as_ref()))));

    if outcome.is_err() {
        abort.store(true, Ordering::Release);
    }
    outcome
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("non-string panic payload")
    }
}

// ============================================================================
// Evaluation Task
// ============================================================================

/// One grid point bound to the evaluator and the shared context.
///
/// Built by the dispatcher, consumed exactly once by [`EvaluationTask::run`]
/// or by a backend that takes it apart with [`EvaluationTask::into_parts`].
pub struct EvaluationTask<C, R> {
    point: GridPoint,
    evaluator: Evaluator<C, R>,
    context: Arc<C>,
}

impl<C, R> EvaluationTask<C, R> {
    pub fn new(point: GridPoint, evaluator: Evaluator<C, R>, context: Arc<C>) -> Self {
        Self {
            point,
            evaluator,
            context,
        }
    }

    pub fn index(&self) -> usize {
        self.point.index()
    }

    pub fn point(&self) -> &GridPoint {
        &self.point
    }

    pub fn evaluator(&self) -> &Evaluator<C, R> {
        &self.evaluator
    }

    pub fn into_parts(self) -> (GridPoint, Evaluator<C, R>, Arc<C>) {
        (self.point, self.evaluator, self.context)
    }

    /// Evaluate in the current thread.
    pub fn run(self, abort: &AtomicBool) -> TaskReport<R> {
        let index = self.index();
        let outcome = guarded(abort, || {
            self.evaluator
                .call(&self.point, &self.context)
                .map_err(TaskError::Failed)
        });
        TaskReport { index, outcome }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Axis, ParameterGrid};

    fn square(point: &GridPoint, offset: &f64) -> anyhow::Result<f64> {
        Ok(point.values()[0].powi(2) + offset)
    }

    fn point(index: usize) -> GridPoint {
        ParameterGrid::product(vec![Axis::new("x", vec![1.0, 2.0, 3.0])])
            .unwrap()
            .point(index)
            .unwrap()
    }

    #[test]
    fn test_function_and_closure_evaluators() {
        let named = Evaluator::function("square", square);
        assert_eq!(named.name(), Some("square"));
        assert!(named.as_function().is_some());
        assert_eq!(named.call(&point(2), &0.5).unwrap(), 9.5);

        let scale = 10.0;
        let closure = Evaluator::closure(move |p: &GridPoint, _: &f64| Ok(p.values()[0] * scale));
        assert_eq!(closure.name(), None);
        assert!(closure.as_function().is_none());
        assert_eq!(closure.call(&point(1), &0.0).unwrap(), 20.0);
        assert_eq!(format!("{:?}", closure.clone()), "Evaluator::Closure");
    }

    #[test]
    fn test_task_runs_once_and_tags_index() {
        let abort = AtomicBool::new(false);
        let task = EvaluationTask::new(point(1), Evaluator::function("square", square), Arc::new(1.0));
        assert_eq!(task.index(), 1);

        let report = task.run(&abort);
        assert_eq!(report.index, 1);
        assert_eq!(report.outcome.unwrap(), 5.0);
        assert!(!abort.load(Ordering::Acquire));
    }

    #[test]
    fn test_failure_raises_abort_and_skips_later_tasks() {
        let abort = AtomicBool::new(false);
        let failing: Evaluator<(), f64> =
            Evaluator::closure(|_, _| Err(anyhow::anyhow!("no convergence")));

        let report = EvaluationTask::new(point(0), failing.clone(), Arc::new(())).run(&abort);
        assert!(matches!(report.outcome, Err(TaskError::Failed(_))));
        assert!(abort.load(Ordering::Acquire));

        let report = EvaluationTask::new(point(1), failing, Arc::new(())).run(&abort);
        assert!(matches!(report.outcome, Err(TaskError::Skipped)));
    }

    #[test]
    fn test_panic_becomes_task_error() {
        let abort = AtomicBool::new(false);
        let panicking: Evaluator<(), f64> = Evaluator::closure(|p, _| {
            if p.index() == 2 {
                panic!("matrix is singular");
            }
            Ok(0.0)
        });

        let report = EvaluationTask::new(point(2), panicking, Arc::new(())).run(&abort);
        match report.outcome {
            Err(TaskError::Panicked(message)) => assert_eq!(message, "matrix is singular"),
            other => panic!("expected panic outcome, got {other:?}"),
        }

        let err = TaskError::Panicked("boom".into()).into_sweep_error(point(2), 1);
        assert!(err.to_string().contains("worker panicked: boom"));
        assert_eq!(err.failed_point().map(GridPoint::index), Some(2));
    }

    #[test]
    fn test_task_error_messages_are_readable() {
        let failed = TaskError::Failed(
            anyhow::anyhow!("residual stayed above 1e-6").context("no convergence"),
        );
        assert_eq!(failed.to_string(), "no convergence: residual stayed above 1e-6");
        assert_eq!(
            TaskError::Panicked("matrix is singular".into()).to_string(),
            "worker panicked: matrix is singular"
        );
        assert_eq!(
            TaskError::Serialization("unexpected end of input".into()).to_string(),
            "serialization failed: unexpected end of input"
        );
        assert_eq!(TaskError::Skipped.to_string(), "skipped after an earlier failure");
    }

    #[test]
    fn test_serialization_error_keeps_point() {
        let err = TaskError::Serialization("bad bytes".into()).into_sweep_error(point(0), 1);
        assert!(err.is_serialization());
        assert_eq!(err.failed_point().map(GridPoint::index), Some(0));
    }
}
