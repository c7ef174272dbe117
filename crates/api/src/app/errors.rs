use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use opsforge_automation::ValidationReport;
use opsforge_core::DomainError;
use opsforge_infra::ServiceError;
use opsforge_infra::run_log::RunLogError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Invalid(report) => validation_response(StatusCode::UNPROCESSABLE_ENTITY, report),
        ServiceError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        ServiceError::InvalidRequest(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_request", msg),
        ServiceError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        ServiceError::Storage(msg) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", msg),
    }
}

pub fn run_log_error_to_response(err: RunLogError) -> axum::response::Response {
    match err {
        RunLogError::NotFound(id) => json_error(StatusCode::NOT_FOUND, "not_found", format!("run {id}")),
        other => json_error(StatusCode::INTERNAL_SERVER_ERROR, "run_log_error", other.to_string()),
    }
}

/// Path segments that fail to parse as ids.
pub fn invalid_id(err: DomainError) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_id", err.to_string())
}

/// Validation results are returned as the report itself, never as an error envelope.
pub fn validation_response(status: StatusCode, report: ValidationReport) -> axum::response::Response {
    (status, axum::Json(report)).into_response()
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
