use serde::{Deserialize, Serialize};
use uuid::Uuid;

use opsforge_core::TenantId;

/// Envelope for an event, containing multi-tenant + delivery metadata.
///
/// Notes:
/// - **Multi-tenancy** is enforced here via `tenant_id`.
/// - `event_id` is stable across redeliveries; consumers use it to detect
///   duplicates (at-least-once delivery).
/// - `payload` is the domain-agnostic event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    tenant_id: TenantId,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(event_id: Uuid, tenant_id: TenantId, payload: E) -> Self {
        Self {
            event_id,
            tenant_id,
            payload,
        }
    }

    /// Wrap a payload with a freshly generated event id.
    pub fn wrap(tenant_id: TenantId, payload: E) -> Self {
        Self::new(Uuid::now_v7(), tenant_id, payload)
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }
}
