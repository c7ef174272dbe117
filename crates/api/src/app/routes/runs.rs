//! Audit trail reads.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use opsforge_core::RunId;
use opsforge_infra::RunLog;

use crate::app::routes::rules::parse_rule_id;
use crate::app::{dto, errors, services::AppServices};
use crate::context::TenantContext;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

pub fn rule_runs_router() -> Router {
    Router::new().route("/:id/runs", get(list_rule_runs))
}

/// GET /rules/:id/runs?limit=N (newest first)
pub async fn list_rule_runs(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Query(query): Query<dto::RunListQuery>,
) -> axum::response::Response {
    let rule_id = match parse_rule_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);

    match services.runs.list_for_rule(tenant.tenant_id(), rule_id, limit) {
        Ok(runs) => (StatusCode::OK, Json(runs)).into_response(),
        Err(e) => errors::run_log_error_to_response(e),
    }
}

pub async fn get_run(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let run_id: RunId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::invalid_id(e),
    };

    match services.runs.get(tenant.tenant_id(), run_id) {
        Ok(Some(run)) => (StatusCode::OK, Json(run)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", format!("run {run_id}")),
        Err(e) => errors::run_log_error_to_response(e),
    }
}
