//! Per-type action handlers and their registry.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use thiserror::Error;

use opsforge_core::{RuleId, RunId, TenantId};

use crate::catalog::ActionTypeDescriptor;
use crate::execution::run::{RunContext, TriggerEvent};
use crate::model::Action;

/// Everything a handler may look at when executing one action.
#[derive(Debug, Clone, Copy)]
pub struct ActionInvocation<'a> {
    pub tenant_id: TenantId,
    pub rule_id: RuleId,
    pub run_id: RunId,
    pub action: &'a Action,
    pub descriptor: &'a ActionTypeDescriptor,
    pub trigger: &'a TriggerEvent,
    pub context: &'a RunContext,
}

impl ActionInvocation<'_> {
    pub fn config(&self) -> &JsonValue {
        &self.action.config
    }

    pub fn config_str(&self, field: &str) -> Result<&str, HandlerError> {
        self.action
            .config
            .get(field)
            .and_then(JsonValue::as_str)
            .ok_or_else(|| HandlerError::invalid_config(format!("'{field}' must be a string")))
    }
}

/// What a handler decided.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerOutcome {
    /// Chosen output port (branching types only).
    pub output: Option<String>,
    /// Data recorded in the step log and the run context.
    pub data: JsonValue,
}

impl HandlerOutcome {
    /// Single-path completion.
    pub fn done() -> Self {
        Self {
            output: None,
            data: JsonValue::Null,
        }
    }

    /// Branching completion through `label`.
    pub fn branch(label: impl Into<String>) -> Self {
        Self {
            output: Some(label.into()),
            data: JsonValue::Null,
        }
    }

    pub fn with_data(mut self, data: JsonValue) -> Self {
        self.data = data;
        self
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("missing input: {0}")]
    MissingInput(String),

    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn missing_input(msg: impl Into<String>) -> Self {
        Self::MissingInput(msg.into())
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// Executes actions of one type.
///
/// Handlers must be safe to call concurrently from multiple runs; each call
/// only sees its own run's context.
pub trait ActionHandler: Send + Sync {
    fn execute(&self, invocation: &ActionInvocation<'_>) -> Result<HandlerOutcome, HandlerError>;
}

struct FnHandler<F>(F);

impl<F> ActionHandler for FnHandler<F>
where
    F: Fn(&ActionInvocation<'_>) -> Result<HandlerOutcome, HandlerError> + Send + Sync,
{
    fn execute(&self, invocation: &ActionInvocation<'_>) -> Result<HandlerOutcome, HandlerError> {
        (self.0)(invocation)
    }
}

/// Handlers keyed by action type key.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl core::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut keys: Vec<_> = self.handlers.keys().collect();
        keys.sort();
        f.debug_struct("HandlerRegistry").field("types", &keys).finish()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with handlers for every built-in action type.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        super::builtin::register_all(&mut registry);
        registry
    }

    /// Register (or replace) the handler for `action_type`.
    pub fn register<H>(&mut self, action_type: impl Into<String>, handler: H)
    where
        H: ActionHandler + 'static,
    {
        self.handlers.insert(action_type.into(), Arc::new(handler));
    }

    /// Register a closure as a handler.
    pub fn register_fn<F>(&mut self, action_type: impl Into<String>, f: F)
    where
        F: Fn(&ActionInvocation<'_>) -> Result<HandlerOutcome, HandlerError> + Send + Sync + 'static,
    {
        self.register(action_type, FnHandler(f));
    }

    pub fn get(&self, action_type: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(action_type).cloned()
    }

    pub fn contains(&self, action_type: &str) -> bool {
        self.handlers.contains_key(action_type)
    }
}
