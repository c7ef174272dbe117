//! Run records: the audit trail of a rule execution.
//!
//! A run is created when a trigger fires, gets one [`StepRecord`] appended per
//! executed action, and is finished exactly once. Records are append-only;
//! nothing here is shared with introspection.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use opsforge_core::{ActionId, RuleId, RunId, TenantId};
use opsforge_events::{EntityChanged, EventEnvelope, LifecycleKind};

/// The lifecycle event that started a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub event_id: Uuid,
    pub entity_type: String,
    pub entity_id: String,
    pub kind: LifecycleKind,
    #[serde(default)]
    pub payload: JsonValue,
    pub occurred_at: DateTime<Utc>,
}

impl From<&EventEnvelope<EntityChanged>> for TriggerEvent {
    fn from(envelope: &EventEnvelope<EntityChanged>) -> Self {
        let event = envelope.payload();
        Self {
            event_id: envelope.event_id(),
            entity_type: event.entity_type.clone(),
            entity_id: event.entity_id.clone(),
            kind: event.kind,
            payload: event.payload.clone(),
            occurred_at: event.occurred_at,
        }
    }
}

/// Data accumulated while walking a rule, keyed by action name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunContext {
    #[serde(default)]
    pub outputs: BTreeMap<String, JsonValue>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, action_name: &str, data: JsonValue) {
        self.outputs.insert(action_name.to_string(), data);
    }

    pub fn output_of(&self, action_name: &str) -> Option<&JsonValue> {
        self.outputs.get(action_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<String>,
        #[serde(default)]
        data: JsonValue,
    },
    Failed {
        error: String,
    },
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Succeeded { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub index: usize,
    pub action_id: ActionId,
    pub action_name: String,
    pub action_type: String,
    pub outcome: StepOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action_id: Option<ActionId>,
        error: String,
    },
}

impl RunStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RunStatus::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: RunId,
    pub tenant_id: TenantId,
    pub rule_id: RuleId,
    /// Version of the rule document this run walks.
    pub rule_version: u64,
    pub trigger: TriggerEvent,
    /// 1 for the first run of a (trigger, rule) pair, +1 per retry.
    pub attempt: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resumed_from: Option<RunId>,
    pub status: RunStatus,
    pub steps: Vec<StepRecord>,
    pub context: RunContext,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunRecord {
    pub fn begin(
        tenant_id: TenantId,
        rule_id: RuleId,
        rule_version: u64,
        trigger: TriggerEvent,
        attempt: u32,
    ) -> Self {
        Self {
            id: RunId::new(),
            tenant_id,
            rule_id,
            rule_version,
            trigger,
            attempt,
            resumed_from: None,
            status: RunStatus::Running,
            steps: Vec::new(),
            context: RunContext::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn resuming(mut self, previous: RunId, context: RunContext) -> Self {
        self.resumed_from = Some(previous);
        self.context = context;
        self
    }

    /// The action a failed run stopped at.
    pub fn failed_action(&self) -> Option<ActionId> {
        match &self.status {
            RunStatus::Failed { action_id, .. } => *action_id,
            _ => None,
        }
    }
}
