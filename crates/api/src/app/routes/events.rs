//! Lifecycle event ingestion.

use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::debug;

use opsforge_events::{EventBus, EventEnvelope};

use crate::app::{dto, errors, services::AppServices};
use crate::context::TenantContext;

/// POST /events
///
/// Publishes the event to the bus and returns immediately; matching rules
/// run on the trigger worker. Re-posting the same `event_id` is a
/// redelivery and follows the configured redelivery policy.
pub async fn ingest_event(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::IngestEventRequest>,
) -> axum::response::Response {
    let (event_id, event) = body.into_event();
    let envelope = EventEnvelope::new(event_id, tenant.tenant_id(), event);

    debug!(tenant_id = %tenant.tenant_id(), event_id = %event_id, "lifecycle event received");
    match services.bus.publish(envelope) {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "event_id": event_id.to_string() })),
        )
            .into_response(),
        Err(e) => errors::json_error(StatusCode::SERVICE_UNAVAILABLE, "publish_error", e.to_string()),
    }
}
