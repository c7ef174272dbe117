//! Walks a rule graph for one run, invoking handlers action by action.

use chrono::Utc;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, warn};

use opsforge_core::{ActionId, RuleId, RunId, TenantId};

use crate::catalog::ActionCatalog;
use crate::execution::handler::{ActionInvocation, HandlerError, HandlerRegistry};
use crate::execution::run::{RunContext, StepOutcome, StepRecord, TriggerEvent};
use crate::graph::{GraphIndex, Hop};
use crate::model::{Action, RuleDocument};

/// Default bound on the number of actions a single walk may execute.
pub const DEFAULT_MAX_STEPS: usize = 256;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("rule has no resolvable start edge")]
    NoEntry,

    #[error("action {0} is not part of the rule")]
    UnknownAction(ActionId),

    #[error("action '{action}' has unknown action type '{action_type}'")]
    UnknownActionType { action: String, action_type: String },

    #[error("no handler registered for action type '{action_type}' (action '{action}')")]
    NoHandler { action: String, action_type: String },

    #[error("action '{action}' failed: {source}")]
    Handler {
        action: String,
        #[source]
        source: HandlerError,
    },

    #[error("action '{action}' has output ports but its handler chose none")]
    MissingOutput { action: String },

    #[error("action '{action}' returned output '{output}', which is not one of its ports")]
    InvalidOutput { action: String, output: String },

    #[error("action '{action}' declares no output ports but its handler returned '{output}'")]
    UnexpectedOutput { action: String, output: String },

    #[error("walk exceeded the limit of {0} steps")]
    StepLimit(usize),
}

/// Where a walk begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPoint {
    /// The start edge's target.
    Entry,
    /// A specific action (used when resuming a failed run).
    Action(ActionId),
}

#[derive(Debug)]
pub struct WalkRequest<'a> {
    pub tenant_id: TenantId,
    pub rule_id: RuleId,
    pub run_id: RunId,
    pub document: &'a RuleDocument,
    pub trigger: &'a TriggerEvent,
    pub start: StartPoint,
    pub context: RunContext,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WalkOutcome {
    pub steps: Vec<StepRecord>,
    pub context: RunContext,
    /// `Err` when the walk stopped on a failure; `failed_action` then names
    /// the action it stopped at, if any.
    pub result: Result<(), ExecutionError>,
    pub failed_action: Option<ActionId>,
}

impl WalkOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Stateless graph walker; one instance serves any number of runs.
#[derive(Debug, Clone, Copy)]
pub struct Walker<'a> {
    catalog: &'a ActionCatalog,
    handlers: &'a HandlerRegistry,
    max_steps: usize,
}

impl<'a> Walker<'a> {
    pub fn new(catalog: &'a ActionCatalog, handlers: &'a HandlerRegistry) -> Self {
        Self {
            catalog,
            handlers,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Walk the graph to a terminal node or the first failure.
    ///
    /// `on_step` sees every step as soon as it is recorded, so callers can
    /// append it to a durable log while the walk is still going.
    pub fn walk(&self, mut request: WalkRequest<'_>, on_step: &mut dyn FnMut(&StepRecord)) -> WalkOutcome {
        let index = GraphIndex::build(request.document);
        let mut context = std::mem::take(&mut request.context);
        let mut steps = Vec::new();

        let first = match request.start {
            StartPoint::Entry => index.entry().ok_or(ExecutionError::NoEntry),
            StartPoint::Action(id) => index.position(&id).ok_or(ExecutionError::UnknownAction(id)),
        };
        let mut current = match first {
            Ok(node) => node,
            Err(err) => {
                return WalkOutcome {
                    steps,
                    context,
                    result: Err(err),
                    failed_action: None,
                };
            }
        };

        loop {
            let action = index.action(current);
            if steps.len() >= self.max_steps {
                warn!(rule_id = %request.rule_id, run_id = %request.run_id, max_steps = self.max_steps, "walk step limit reached");
                return WalkOutcome {
                    steps,
                    context,
                    result: Err(ExecutionError::StepLimit(self.max_steps)),
                    failed_action: Some(action.id),
                };
            }

            let started_at = Utc::now();
            let result = self.execute_one(&request, action, &context);
            let finished_at = Utc::now();

            let outcome = match &result {
                Ok((output, data)) => StepOutcome::Succeeded {
                    output: output.clone(),
                    data: data.clone(),
                },
                Err(err) => StepOutcome::Failed { error: err.to_string() },
            };
            let step = StepRecord {
                index: steps.len(),
                action_id: action.id,
                action_name: action.name.clone(),
                action_type: action.action_type.clone(),
                outcome,
                started_at,
                finished_at,
                duration_ms: (finished_at - started_at).num_milliseconds(),
            };
            on_step(&step);
            steps.push(step);

            let output = match result {
                Ok((output, data)) => {
                    context.record(&action.name, data);
                    output
                }
                Err(err) => {
                    debug!(rule_id = %request.rule_id, run_id = %request.run_id, action = %action.name, error = %err, "walk stopped on failure");
                    return WalkOutcome {
                        steps,
                        context,
                        result: Err(err),
                        failed_action: Some(action.id),
                    };
                }
            };

            match index.resolve(current, output.as_deref()) {
                Hop::Edge(e) => match index.target_of(e) {
                    Some(next) => current = next,
                    None => break,
                },
                // A chosen port with no wired edge ends the walk here.
                Hop::Branch(_) | Hop::Terminal => break,
            }
        }

        WalkOutcome {
            steps,
            context,
            result: Ok(()),
            failed_action: None,
        }
    }

    fn execute_one(
        &self,
        request: &WalkRequest<'_>,
        action: &Action,
        context: &RunContext,
    ) -> Result<(Option<String>, JsonValue), ExecutionError> {
        let descriptor = self
            .catalog
            .get(&action.action_type)
            .ok_or_else(|| ExecutionError::UnknownActionType {
                action: action.name.clone(),
                action_type: action.action_type.clone(),
            })?;
        let handler = self
            .handlers
            .get(&action.action_type)
            .ok_or_else(|| ExecutionError::NoHandler {
                action: action.name.clone(),
                action_type: action.action_type.clone(),
            })?;

        let invocation = ActionInvocation {
            tenant_id: request.tenant_id,
            rule_id: request.rule_id,
            run_id: request.run_id,
            action,
            descriptor,
            trigger: request.trigger,
            context,
        };
        let outcome = handler.execute(&invocation).map_err(|source| ExecutionError::Handler {
            action: action.name.clone(),
            source,
        })?;

        match (&outcome.output, descriptor.is_branching()) {
            (None, true) => Err(ExecutionError::MissingOutput {
                action: action.name.clone(),
            }),
            (Some(label), true) if !descriptor.has_port(label) => Err(ExecutionError::InvalidOutput {
                action: action.name.clone(),
                output: label.clone(),
            }),
            (Some(label), false) => Err(ExecutionError::UnexpectedOutput {
                action: action.name.clone(),
                output: label.clone(),
            }),
            _ => Ok((outcome.output, outcome.data)),
        }
    }
}
