use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use crate::app::{errors, routes::system, services::AppServices};

/// Read-only, tenant-independent endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/action-types", get(list_action_types))
        .route("/action-types/:key", get(get_action_type))
        .route("/system/config", get(system::config))
}

pub async fn list_action_types(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    Json(services.catalog.list_all()).into_response()
}

pub async fn get_action_type(
    Extension(services): Extension<Arc<AppServices>>,
    Path(key): Path<String>,
) -> axum::response::Response {
    match services.catalog.lookup(&key) {
        Ok(descriptor) => (StatusCode::OK, Json(descriptor)).into_response(),
        Err(e) => errors::json_error(StatusCode::NOT_FOUND, "not_found", e.to_string()),
    }
}
