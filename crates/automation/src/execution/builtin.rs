//! Handlers for the built-in action types.
//!
//! `condition` and `check_inventory` evaluate the trigger payload and pick a
//! port. Every other built-in type is an effect: the handler logs the
//! intended effect and records it in the run context. Delivering effects to
//! external systems is left to handlers registered by the host.

use serde_json::{Value as JsonValue, json};
use tracing::{info, warn};

use crate::catalog::ActionCategory;
use crate::execution::handler::{ActionHandler, ActionInvocation, HandlerError, HandlerOutcome, HandlerRegistry};

pub(super) fn register_all(registry: &mut HandlerRegistry) {
    registry.register("condition", ConditionHandler);
    registry.register("check_inventory", CheckInventoryHandler);
    for effect in [
        "fulfill_order",
        "send_notification",
        "create_alert",
        "audit_log",
        "update_field",
        "webhook",
    ] {
        registry.register(effect, EffectHandler);
    }
}

/// Resolve a dot path (`line.items.0.sku`) inside a JSON document.
pub fn lookup_path<'v>(value: &'v JsonValue, path: &str) -> Option<&'v JsonValue> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| match current {
            JsonValue::Object(map) => map.get(segment),
            JsonValue::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionHandler;

impl ActionHandler for ConditionHandler {
    fn execute(&self, invocation: &ActionInvocation<'_>) -> Result<HandlerOutcome, HandlerError> {
        let field = invocation.config_str("field")?;
        let operator = invocation.config_str("operator")?;
        let actual = lookup_path(&invocation.trigger.payload, field).filter(|v| !v.is_null());
        let expected = invocation.config().get("value");

        let result = evaluate(operator, field, actual, expected)?;
        let label = if result { "true" } else { "false" };

        Ok(HandlerOutcome::branch(label).with_data(json!({
            "field": field,
            "operator": operator,
            "actual": actual,
            "result": result,
        })))
    }
}

fn evaluate(
    operator: &str,
    field: &str,
    actual: Option<&JsonValue>,
    expected: Option<&JsonValue>,
) -> Result<bool, HandlerError> {
    let null = JsonValue::Null;
    match operator {
        "exists" => Ok(actual.is_some()),
        "eq" => Ok(actual.unwrap_or(&null) == expected.unwrap_or(&null)),
        "ne" => Ok(actual.unwrap_or(&null) != expected.unwrap_or(&null)),
        "contains" => {
            let actual = actual.ok_or_else(|| HandlerError::missing_input(format!("field '{field}' is absent")))?;
            let expected = expected.ok_or_else(|| HandlerError::invalid_config("'contains' needs a value"))?;
            match (actual, expected) {
                (JsonValue::String(haystack), JsonValue::String(needle)) => Ok(haystack.contains(needle.as_str())),
                (JsonValue::Array(items), needle) => Ok(items.contains(needle)),
                _ => Err(HandlerError::failed(format!(
                    "'contains' needs a string or array at '{field}'"
                ))),
            }
        }
        "gt" | "gte" | "lt" | "lte" => {
            let actual = actual.ok_or_else(|| HandlerError::missing_input(format!("field '{field}' is absent")))?;
            let expected = expected.ok_or_else(|| HandlerError::invalid_config(format!("'{operator}' needs a value")))?;
            let ordering = match (actual, expected) {
                (JsonValue::Number(a), JsonValue::Number(b)) => {
                    let (a, b) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
                    a.partial_cmp(&b)
                }
                (JsonValue::String(a), JsonValue::String(b)) => Some(a.cmp(b)),
                _ => None,
            }
            .ok_or_else(|| {
                HandlerError::failed(format!("cannot compare '{field}' with '{operator}' against {expected}"))
            })?;

            Ok(match operator {
                "gt" => ordering.is_gt(),
                "gte" => ordering.is_ge(),
                "lt" => ordering.is_lt(),
                _ => ordering.is_le(),
            })
        }
        other => Err(HandlerError::invalid_config(format!("unsupported operator '{other}'"))),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CheckInventoryHandler;

impl ActionHandler for CheckInventoryHandler {
    fn execute(&self, invocation: &ActionInvocation<'_>) -> Result<HandlerOutcome, HandlerError> {
        let quantity_field = invocation.config_str("quantity_field")?;
        let minimum = invocation
            .config()
            .get("minimum")
            .and_then(JsonValue::as_f64)
            .ok_or_else(|| HandlerError::invalid_config("'minimum' must be a number"))?;
        let quantity = lookup_path(&invocation.trigger.payload, quantity_field)
            .and_then(JsonValue::as_f64)
            .ok_or_else(|| {
                HandlerError::missing_input(format!("payload has no numeric '{quantity_field}'"))
            })?;

        let label = if quantity >= minimum { "sufficient" } else { "insufficient" };
        Ok(HandlerOutcome::branch(label).with_data(json!({
            "quantity": quantity,
            "minimum": minimum,
        })))
    }
}

/// Records the intended effect of a single-path action.
#[derive(Debug, Clone, Copy, Default)]
pub struct EffectHandler;

impl ActionHandler for EffectHandler {
    fn execute(&self, invocation: &ActionInvocation<'_>) -> Result<HandlerOutcome, HandlerError> {
        let action = invocation.action;
        let trigger = invocation.trigger;

        match invocation.descriptor.category {
            ActionCategory::Alert => warn!(
                tenant_id = %invocation.tenant_id,
                rule_id = %invocation.rule_id,
                run_id = %invocation.run_id,
                action = %action.name,
                entity_id = %trigger.entity_id,
                config = %action.config,
                "automation alert raised"
            ),
            _ => info!(
                tenant_id = %invocation.tenant_id,
                rule_id = %invocation.rule_id,
                run_id = %invocation.run_id,
                action = %action.name,
                action_type = %action.action_type,
                entity_id = %trigger.entity_id,
                "automation effect recorded"
            ),
        }

        Ok(HandlerOutcome::done().with_data(json!({
            "effect": action.action_type,
            "entity_type": trigger.entity_type,
            "entity_id": trigger.entity_id,
            "config": action.config,
        })))
    }
}
