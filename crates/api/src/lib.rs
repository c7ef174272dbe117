//! HTTP API: routing and request/response mapping over the automation
//! engine.

pub mod app;
pub mod context;
pub mod middleware;
