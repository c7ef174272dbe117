//! Read-only graph introspection over the latest stored rule.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use crate::app::routes::rules::parse_rule_id;
use crate::app::{dto, errors, services::AppServices};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/:id/explain-node", post(explain_node))
        .route("/:id/explain-path", post(explain_path))
        .route("/:id/analysis", get(analysis))
}

/// POST /rules/:id/explain-node `{identifier}` (action id or unique name)
pub async fn explain_node(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ExplainNodeRequest>,
) -> axum::response::Response {
    let rule_id = match parse_rule_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.rules.explain_node(tenant.tenant_id(), rule_id, &body.identifier) {
        Ok(node) => (StatusCode::OK, Json(node)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// POST /rules/:id/explain-path `{from?, output?}`
pub async fn explain_path(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ExplainPathRequest>,
) -> axum::response::Response {
    let rule_id = match parse_rule_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.rules.explain_path(
        tenant.tenant_id(),
        rule_id,
        body.from.as_deref(),
        body.output.as_deref(),
    ) {
        Ok(path) => (StatusCode::OK, Json(path)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn analysis(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let rule_id = match parse_rule_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.rules.analyze(tenant.tenant_id(), rule_id) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
