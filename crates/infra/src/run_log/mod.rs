//! Append-only audit trail of rule executions.

mod in_memory;

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use opsforge_automation::{RunContext, RunRecord, RunStatus, StepRecord};
use opsforge_core::{RuleId, RunId, TenantId};

pub use in_memory::InMemoryRunLog;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RunLogError {
    #[error("run not found: {0}")]
    NotFound(RunId),

    #[error("run already exists: {0}")]
    AlreadyExists(RunId),

    /// Steps and the final status can only be written while a run is running.
    #[error("run already finished: {0}")]
    AlreadyFinished(RunId),

    #[error("run {0} cannot be finished with a running status")]
    NotFinal(RunId),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Run/step log. Records are immutable once finished.
pub trait RunLog: Send + Sync {
    /// Record a new run (status must be `Running`).
    fn begin(&self, run: RunRecord) -> Result<(), RunLogError>;

    /// Append one step to a running run.
    fn append_step(&self, tenant_id: TenantId, run_id: RunId, step: StepRecord) -> Result<(), RunLogError>;

    /// Set the final status and context. Allowed exactly once.
    fn finish(
        &self,
        tenant_id: TenantId,
        run_id: RunId,
        status: RunStatus,
        context: RunContext,
    ) -> Result<RunRecord, RunLogError>;

    fn get(&self, tenant_id: TenantId, run_id: RunId) -> Result<Option<RunRecord>, RunLogError>;

    /// Most recent runs of a rule, newest first.
    fn list_for_rule(&self, tenant_id: TenantId, rule_id: RuleId, limit: usize) -> Result<Vec<RunRecord>, RunLogError>;

    /// Every run of `rule_id` started by the event `event_id`, oldest attempt first.
    fn find_for_trigger(
        &self,
        tenant_id: TenantId,
        event_id: Uuid,
        rule_id: RuleId,
    ) -> Result<Vec<RunRecord>, RunLogError>;
}

impl<L> RunLog for Arc<L>
where
    L: RunLog + ?Sized,
{
    fn begin(&self, run: RunRecord) -> Result<(), RunLogError> {
        (**self).begin(run)
    }

    fn append_step(&self, tenant_id: TenantId, run_id: RunId, step: StepRecord) -> Result<(), RunLogError> {
        (**self).append_step(tenant_id, run_id, step)
    }

    fn finish(
        &self,
        tenant_id: TenantId,
        run_id: RunId,
        status: RunStatus,
        context: RunContext,
    ) -> Result<RunRecord, RunLogError> {
        (**self).finish(tenant_id, run_id, status, context)
    }

    fn get(&self, tenant_id: TenantId, run_id: RunId) -> Result<Option<RunRecord>, RunLogError> {
        (**self).get(tenant_id, run_id)
    }

    fn list_for_rule(&self, tenant_id: TenantId, rule_id: RuleId, limit: usize) -> Result<Vec<RunRecord>, RunLogError> {
        (**self).list_for_rule(tenant_id, rule_id, limit)
    }

    fn find_for_trigger(
        &self,
        tenant_id: TenantId,
        event_id: Uuid,
        rule_id: RuleId,
    ) -> Result<Vec<RunRecord>, RunLogError> {
        (**self).find_for_trigger(tenant_id, event_id, rule_id)
    }
}
