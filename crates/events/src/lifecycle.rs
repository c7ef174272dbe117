//! Entity lifecycle events (the trigger source for automation rules).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::Event;

/// What happened to an entity.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleKind {
    Created,
    Updated,
    Deleted,
}

impl LifecycleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleKind::Created => "created",
            LifecycleKind::Updated => "updated",
            LifecycleKind::Deleted => "deleted",
        }
    }
}

impl core::fmt::Display for LifecycleKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A create/update/delete of one entity, as published by a domain package.
///
/// `payload` is the entity state the publisher chose to attach (usually the
/// row after the change, or the row before a delete). Handlers read it as an
/// opaque JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityChanged {
    pub entity_type: String,
    pub entity_id: String,
    pub kind: LifecycleKind,
    #[serde(default)]
    pub payload: JsonValue,
    pub occurred_at: DateTime<Utc>,
}

impl EntityChanged {
    pub fn new(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        kind: LifecycleKind,
        payload: JsonValue,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            kind,
            payload,
            occurred_at: Utc::now(),
        }
    }

    pub fn created(entity_type: impl Into<String>, entity_id: impl Into<String>, payload: JsonValue) -> Self {
        Self::new(entity_type, entity_id, LifecycleKind::Created, payload)
    }

    pub fn updated(entity_type: impl Into<String>, entity_id: impl Into<String>, payload: JsonValue) -> Self {
        Self::new(entity_type, entity_id, LifecycleKind::Updated, payload)
    }

    pub fn deleted(entity_type: impl Into<String>, entity_id: impl Into<String>, payload: JsonValue) -> Self {
        Self::new(entity_type, entity_id, LifecycleKind::Deleted, payload)
    }
}

impl Event for EntityChanged {
    fn event_type(&self) -> String {
        format!("{}.{}", self.entity_type, self.kind)
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_combines_entity_and_kind() {
        let ev = EntityChanged::created("inventory_item", "42", serde_json::json!({}));
        assert_eq!(ev.event_type(), "inventory_item.created");
    }

    #[test]
    fn payload_defaults_to_null_when_absent() {
        let ev: EntityChanged = serde_json::from_value(serde_json::json!({
            "entity_type": "warehouse",
            "entity_id": "w-1",
            "kind": "deleted",
            "occurred_at": "2024-01-01T00:00:00Z",
        }))
        .unwrap();
        assert_eq!(ev.kind, LifecycleKind::Deleted);
        assert!(ev.payload.is_null());
    }
}
