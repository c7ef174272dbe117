//! `opsforge-automation`: the workflow automation graph engine.
//!
//! A rule says "when entity X is created/updated/deleted, run this graph of
//! actions". This crate owns:
//!
//! - the action type [`catalog`] (config schemas + output ports)
//! - the graph [`model`] and its indexed view ([`graph`])
//! - the [`validator`] (structural + semantic checks, dry-run friendly)
//! - introspection ([`introspect`]) and complexity [`analysis`]
//! - [`execution`]: handlers, the graph walker and run records
//!
//! Everything here is pure and synchronous. Storage, trigger dispatch and
//! transport live in `opsforge-infra` / `opsforge-api`.

pub mod analysis;
pub mod catalog;
pub mod error;
pub mod execution;
pub mod graph;
pub mod introspect;
pub mod model;
pub mod validator;

pub use analysis::{RuleAnalysis, Suggestion, SuggestionCode, analyze};
pub use catalog::{ActionCatalog, ActionCategory, ActionTypeDescriptor, CatalogError, ConfigSchema, FieldKind};
pub use error::{AutomationError, AutomationResult};
pub use execution::{
    ActionHandler, ActionInvocation, ExecutionError, HandlerError, HandlerOutcome, HandlerRegistry, RunContext,
    RunRecord, RunStatus, StartPoint, StepOutcome, StepRecord, TriggerEvent, WalkOutcome, WalkRequest, Walker,
};
pub use graph::{GraphIndex, Hop, START_NODE};
pub use introspect::{EdgeRef, NodeExplanation, PathExplanation, PathStep, PathStop, explain_node, explain_path};
pub use model::{Action, Edge, EdgeType, Rule, RuleDocument, TriggerType};
pub use validator::{IssueKind, ValidationIssue, ValidationReport, Validator};
