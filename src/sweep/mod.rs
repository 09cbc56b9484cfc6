//! Sweep orchestration: tasks, result reassembly and the dispatcher.

pub mod buffer;
pub mod dispatcher;
pub mod task;

pub use self::buffer::{ResultBuffer, SweepResult};
pub use self::dispatcher::SweepDispatcher;
pub use self::task::{EvalFn, EvaluationTask, Evaluator, TaskError, TaskReport};
