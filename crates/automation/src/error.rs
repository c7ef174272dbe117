//! Error model of the automation engine.

use thiserror::Error;

use crate::validator::ValidationReport;

pub type AutomationResult<T> = Result<T, AutomationError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AutomationError {
    /// The graph failed validation; the report lists every violation.
    #[error("rule graph is invalid ({} error(s))", .0.errors.len())]
    Validation(ValidationReport),

    #[error("not found: {0}")]
    NotFound(String),

    /// The request itself is inconsistent (e.g. `output` without `from`).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl AutomationError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }
}
