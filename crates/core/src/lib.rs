//! `opsforge-core`: shared building blocks for the automation platform.
//!
//! This crate contains **pure** primitives (no infrastructure concerns):
//! identifiers, the domain error model and optimistic concurrency checks.

pub mod entity;
pub mod error;
pub mod id;
pub mod version;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{ActionId, EdgeId, RuleId, RunId, TenantId};
pub use version::ExpectedVersion;
