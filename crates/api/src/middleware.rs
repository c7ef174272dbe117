use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use opsforge_core::TenantId;

use crate::app::errors::json_error;
use crate::context::TenantContext;

pub const TENANT_HEADER: &str = "x-tenant-id";

/// Resolve the tenant from the `x-tenant-id` header.
///
/// Authentication is handled in front of this service; the header is trusted.
pub async fn tenant_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let tenant_id = extract_tenant(req.headers())?;
    req.extensions_mut().insert(TenantContext::new(tenant_id));
    Ok(next.run(req).await)
}

fn extract_tenant(headers: &HeaderMap) -> Result<TenantId, Response> {
    let header = headers
        .get(TENANT_HEADER)
        .ok_or_else(|| json_error(StatusCode::BAD_REQUEST, "missing_tenant", "x-tenant-id header is required"))?;

    let value = header
        .to_str()
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, "invalid_tenant", "x-tenant-id is not valid text"))?;

    value
        .trim()
        .parse::<TenantId>()
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, "invalid_tenant", e.to_string()))
}
