use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use crate::app::services::AppServices;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Effective dispatcher settings.
pub async fn config(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "redelivery_policy": services.dispatcher.policy.to_string(),
        "max_steps": services.dispatcher.max_steps,
    }))
}
