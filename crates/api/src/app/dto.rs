use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

use opsforge_events::{EntityChanged, LifecycleKind};
use opsforge_infra::StoredRule;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct WriteQuery {
    #[serde(default)]
    pub dry_run: bool,
    /// Only used by whole-document replace.
    pub expected_version: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ExplainNodeRequest {
    pub identifier: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExplainPathRequest {
    pub from: Option<String>,
    pub output: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RunListQuery {
    pub limit: Option<usize>,
}

/// An entity lifecycle event pushed by a domain package.
#[derive(Debug, Deserialize)]
pub struct IngestEventRequest {
    /// Stable id for redeliveries; generated when absent.
    pub event_id: Option<Uuid>,
    pub entity_type: String,
    pub entity_id: String,
    pub kind: LifecycleKind,
    #[serde(default)]
    pub payload: JsonValue,
    pub occurred_at: Option<DateTime<Utc>>,
}

impl IngestEventRequest {
    pub fn into_event(self) -> (Uuid, EntityChanged) {
        let mut event = EntityChanged::new(self.entity_type, self.entity_id, self.kind, self.payload);
        if let Some(at) = self.occurred_at {
            event.occurred_at = at;
        }
        (self.event_id.unwrap_or_else(Uuid::now_v7), event)
    }
}

// -------------------------
// Response mapping
// -------------------------

pub fn rule_to_json(stored: &StoredRule) -> JsonValue {
    json!({
        "id": stored.rule_id().to_string(),
        "version": stored.version,
        "updated_at": stored.updated_at,
        "rule": stored.document.rule,
        "actions": stored.document.actions,
        "edges": stored.document.edges,
    })
}

pub fn rule_summary_to_json(stored: &StoredRule) -> JsonValue {
    let rule = &stored.document.rule;
    json!({
        "id": rule.id.to_string(),
        "name": rule.name,
        "trigger": rule.trigger,
        "entity_type": rule.entity_type,
        "active": rule.active,
        "version": stored.version,
        "action_count": stored.document.actions.len(),
        "updated_at": stored.updated_at,
    })
}
