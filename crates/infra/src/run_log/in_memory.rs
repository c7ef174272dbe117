use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use uuid::Uuid;

use opsforge_automation::{RunContext, RunRecord, RunStatus, StepRecord};
use opsforge_core::{RuleId, RunId, TenantId};

use super::{RunLog, RunLogError};

/// In-memory run log for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryRunLog {
    runs: RwLock<HashMap<(TenantId, RunId), RunRecord>>,
}

impl InMemoryRunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

fn poisoned() -> RunLogError {
    RunLogError::Storage("run log lock poisoned".to_string())
}

impl RunLog for InMemoryRunLog {
    fn begin(&self, run: RunRecord) -> Result<(), RunLogError> {
        let mut runs = self.runs.write().map_err(|_| poisoned())?;
        let key = (run.tenant_id, run.id);
        if runs.contains_key(&key) {
            return Err(RunLogError::AlreadyExists(run.id));
        }
        if run.status.is_finished() {
            return Err(RunLogError::AlreadyFinished(run.id));
        }
        runs.insert(key, run);
        Ok(())
    }

    fn append_step(&self, tenant_id: TenantId, run_id: RunId, step: StepRecord) -> Result<(), RunLogError> {
        let mut runs = self.runs.write().map_err(|_| poisoned())?;
        let run = runs
            .get_mut(&(tenant_id, run_id))
            .ok_or(RunLogError::NotFound(run_id))?;
        if run.status.is_finished() {
            return Err(RunLogError::AlreadyFinished(run_id));
        }
        run.steps.push(step);
        Ok(())
    }

    fn finish(
        &self,
        tenant_id: TenantId,
        run_id: RunId,
        status: RunStatus,
        context: RunContext,
    ) -> Result<RunRecord, RunLogError> {
        if !status.is_finished() {
            return Err(RunLogError::NotFinal(run_id));
        }
        let mut runs = self.runs.write().map_err(|_| poisoned())?;
        let run = runs
            .get_mut(&(tenant_id, run_id))
            .ok_or(RunLogError::NotFound(run_id))?;
        if run.status.is_finished() {
            return Err(RunLogError::AlreadyFinished(run_id));
        }
        run.status = status;
        run.context = context;
        run.finished_at = Some(Utc::now());
        Ok(run.clone())
    }

    fn get(&self, tenant_id: TenantId, run_id: RunId) -> Result<Option<RunRecord>, RunLogError> {
        let runs = self.runs.read().map_err(|_| poisoned())?;
        Ok(runs.get(&(tenant_id, run_id)).cloned())
    }

    fn list_for_rule(&self, tenant_id: TenantId, rule_id: RuleId, limit: usize) -> Result<Vec<RunRecord>, RunLogError> {
        let runs = self.runs.read().map_err(|_| poisoned())?;
        let mut matching: Vec<RunRecord> = runs
            .values()
            .filter(|r| r.tenant_id == tenant_id && r.rule_id == rule_id)
            .cloned()
            .collect();
        // Run ids are UUIDv7, so they sort by creation time.
        matching.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
        matching.truncate(limit);
        Ok(matching)
    }

    fn find_for_trigger(
        &self,
        tenant_id: TenantId,
        event_id: Uuid,
        rule_id: RuleId,
    ) -> Result<Vec<RunRecord>, RunLogError> {
        let runs = self.runs.read().map_err(|_| poisoned())?;
        let mut matching: Vec<RunRecord> = runs
            .values()
            .filter(|r| r.tenant_id == tenant_id && r.rule_id == rule_id && r.trigger.event_id == event_id)
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.attempt);
        Ok(matching)
    }
}
