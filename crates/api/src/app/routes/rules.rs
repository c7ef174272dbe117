//! Rule authoring: dry-run, create, whole-document replace, reads, delete.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use opsforge_automation::{RuleDocument, ValidationReport};
use opsforge_core::{ExpectedVersion, RuleId};

use crate::app::{dto, errors, services::AppServices};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_rules).post(create_rule))
        .route("/:id", get(get_rule).put(replace_rule).delete(delete_rule))
        .route("/:id/actions", get(get_actions))
        .route("/:id/edges", get(get_edges))
}

/// Unparseable bodies are answered as a validation result at path `$`.
fn document_or_report(
    body: Result<Json<RuleDocument>, JsonRejection>,
    dry_run: bool,
) -> Result<RuleDocument, axum::response::Response> {
    body.map(|Json(doc)| doc).map_err(|rejection| {
        errors::validation_response(
            StatusCode::BAD_REQUEST,
            ValidationReport::malformed(rejection.body_text(), dry_run),
        )
    })
}

pub(crate) fn parse_rule_id(id: &str) -> Result<RuleId, axum::response::Response> {
    id.parse::<RuleId>().map_err(errors::invalid_id)
}

/// POST /rules?dry_run=true
pub async fn create_rule(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Query(query): Query<dto::WriteQuery>,
    body: Result<Json<RuleDocument>, JsonRejection>,
) -> axum::response::Response {
    let document = match document_or_report(body, query.dry_run) {
        Ok(doc) => doc,
        Err(resp) => return resp,
    };

    if query.dry_run {
        return errors::validation_response(StatusCode::OK, services.rules.dry_run(&document));
    }

    match services.rules.create(tenant.tenant_id(), document) {
        Ok(stored) => (StatusCode::CREATED, Json(dto::rule_to_json(&stored))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// PUT /rules/:id?dry_run=true&expected_version=N
pub async fn replace_rule(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Query(query): Query<dto::WriteQuery>,
    body: Result<Json<RuleDocument>, JsonRejection>,
) -> axum::response::Response {
    let rule_id = match parse_rule_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let document = match document_or_report(body, query.dry_run) {
        Ok(doc) => doc,
        Err(resp) => return resp,
    };

    if query.dry_run {
        return errors::validation_response(StatusCode::OK, services.rules.dry_run(&document));
    }

    let expected = ExpectedVersion::from(query.expected_version);
    match services.rules.update(tenant.tenant_id(), rule_id, document, expected) {
        Ok(stored) => (StatusCode::OK, Json(dto::rule_to_json(&stored))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_rules(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    match services.rules.list(tenant.tenant_id()) {
        Ok(rules) => {
            let items: Vec<_> = rules.iter().map(dto::rule_summary_to_json).collect();
            (StatusCode::OK, Json(items)).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_rule(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let rule_id = match parse_rule_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.rules.get(tenant.tenant_id(), rule_id) {
        Ok(stored) => (StatusCode::OK, Json(dto::rule_to_json(&stored))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_actions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let rule_id = match parse_rule_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.rules.actions(tenant.tenant_id(), rule_id) {
        Ok(actions) => (StatusCode::OK, Json(actions)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_edges(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let rule_id = match parse_rule_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.rules.edges(tenant.tenant_id(), rule_id) {
        Ok(edges) => (StatusCode::OK, Json(edges)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_rule(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let rule_id = match parse_rule_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.rules.delete(tenant.tenant_id(), rule_id) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
