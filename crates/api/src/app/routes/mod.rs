use axum::{
    Router,
    routing::{get, post},
};

pub mod catalog;
pub mod events;
pub mod introspection;
pub mod rules;
pub mod runs;
pub mod system;

/// Router for all tenant-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/rules", rules::router().merge(introspection::router()).merge(runs::rule_runs_router()))
        .route("/runs/:id", get(runs::get_run))
        .route("/events", post(events::ingest_event))
}
