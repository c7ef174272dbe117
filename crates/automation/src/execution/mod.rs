//! Rule execution: handlers, the graph walker and run records.

mod builtin;
pub mod handler;
pub mod run;
pub mod walker;

pub use builtin::{CheckInventoryHandler, ConditionHandler, EffectHandler, lookup_path};
pub use handler::{ActionHandler, ActionInvocation, HandlerError, HandlerOutcome, HandlerRegistry};
pub use run::{RunContext, RunRecord, RunStatus, StepOutcome, StepRecord, TriggerEvent};
pub use walker::{DEFAULT_MAX_STEPS, ExecutionError, StartPoint, WalkOutcome, WalkRequest, Walker};
