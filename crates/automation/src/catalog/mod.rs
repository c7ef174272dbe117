//! Action type catalog.
//!
//! A registrable lookup table from a type key to its descriptor. The rest of
//! the engine never branches on type identity: it only consults the
//! descriptor's config schema, output ports and category.

mod builtin;
pub mod schema;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use schema::{ConfigSchema, FieldKind, FieldSpec, SchemaViolation};

/// Coarse grouping of action types, used by analysis heuristics.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    Condition,
    Inventory,
    Notification,
    Alert,
    Audit,
    Data,
    Integration,
}

/// Everything the engine knows about one action type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTypeDescriptor {
    pub key: String,
    pub category: ActionCategory,
    #[serde(default)]
    pub description: String,
    pub config_schema: ConfigSchema,
    /// Ordered, distinct output-port labels. Empty for single-path types.
    #[serde(default)]
    pub output_ports: Vec<String>,
}

impl ActionTypeDescriptor {
    pub fn new(key: impl Into<String>, category: ActionCategory) -> Self {
        Self {
            key: key.into(),
            category,
            description: String::new(),
            config_schema: ConfigSchema::default(),
            output_ports: Vec::new(),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_schema(mut self, schema: ConfigSchema) -> Self {
        self.config_schema = schema;
        self
    }

    pub fn with_ports<I, S>(mut self, ports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_ports = ports.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the handler must choose one of several output ports.
    pub fn is_branching(&self) -> bool {
        !self.output_ports.is_empty()
    }

    pub fn has_port(&self, label: &str) -> bool {
        self.output_ports.iter().any(|p| p == label)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("unknown action type '{0}'")]
    UnknownType(String),

    #[error("action type '{0}' is already registered")]
    Duplicate(String),

    #[error("action type '{key}' declares output port '{port}' more than once")]
    DuplicatePort { key: String, port: String },

    #[error("action type key must not be empty")]
    EmptyKey,
}

/// Registry of action type descriptors.
///
/// Built once at startup and shared read-only (usually behind an `Arc`).
#[derive(Debug, Clone, Default)]
pub struct ActionCatalog {
    descriptors: BTreeMap<String, ActionTypeDescriptor>,
}

impl ActionCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog pre-populated with the built-in action types.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        for descriptor in builtin::descriptors() {
            let registered = catalog.register(descriptor);
            debug_assert!(registered.is_ok(), "built-in action type rejected: {registered:?}");
        }
        catalog
    }

    pub fn register(&mut self, descriptor: ActionTypeDescriptor) -> Result<(), CatalogError> {
        if descriptor.key.trim().is_empty() {
            return Err(CatalogError::EmptyKey);
        }
        if self.descriptors.contains_key(&descriptor.key) {
            return Err(CatalogError::Duplicate(descriptor.key));
        }
        for (i, port) in descriptor.output_ports.iter().enumerate() {
            if descriptor.output_ports[..i].contains(port) {
                return Err(CatalogError::DuplicatePort {
                    key: descriptor.key.clone(),
                    port: port.clone(),
                });
            }
        }

        self.descriptors.insert(descriptor.key.clone(), descriptor);
        Ok(())
    }

    pub fn lookup(&self, key: &str) -> Result<&ActionTypeDescriptor, CatalogError> {
        self.descriptors
            .get(key)
            .ok_or_else(|| CatalogError::UnknownType(key.to_string()))
    }

    pub fn get(&self, key: &str) -> Option<&ActionTypeDescriptor> {
        self.descriptors.get(key)
    }

    /// All descriptors, sorted by key.
    pub fn list_all(&self) -> Vec<&ActionTypeDescriptor> {
        self.descriptors.values().collect()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_is_sorted_and_complete() {
        let catalog = ActionCatalog::builtin();
        let keys: Vec<_> = catalog.list_all().iter().map(|d| d.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "audit_log",
                "check_inventory",
                "condition",
                "create_alert",
                "fulfill_order",
                "send_notification",
                "update_field",
                "webhook",
            ]
        );
    }

    #[test]
    fn every_builtin_descriptor_registers_cleanly() {
        let mut catalog = ActionCatalog::new();
        for descriptor in builtin::descriptors() {
            let key = descriptor.key.clone();
            assert_eq!(catalog.register(descriptor), Ok(()), "{key}");
        }
        assert_eq!(catalog.len(), ActionCatalog::builtin().len());
    }

    #[test]
    fn lookup_unknown_type_is_not_found() {
        let catalog = ActionCatalog::builtin();
        assert_eq!(
            catalog.lookup("teleport").unwrap_err(),
            CatalogError::UnknownType("teleport".into())
        );
        assert_eq!(
            catalog.lookup("check_inventory").unwrap().output_ports,
            vec!["sufficient", "insufficient"]
        );
    }

    #[test]
    fn register_rejects_duplicates() {
        let mut catalog = ActionCatalog::builtin();
        let err = catalog
            .register(ActionTypeDescriptor::new("webhook", ActionCategory::Integration))
            .unwrap_err();
        assert_eq!(err, CatalogError::Duplicate("webhook".into()));

        let err = catalog
            .register(
                ActionTypeDescriptor::new("approval", ActionCategory::Condition)
                    .with_ports(["approved", "rejected", "approved"]),
            )
            .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicatePort { port, .. } if port == "approved"));
    }

    #[test]
    fn registered_types_become_visible() {
        let mut catalog = ActionCatalog::new();
        catalog
            .register(
                ActionTypeDescriptor::new("approval", ActionCategory::Condition)
                    .with_ports(["approved", "rejected"]),
            )
            .unwrap();

        let descriptor = catalog.lookup("approval").unwrap();
        assert!(descriptor.is_branching());
        assert!(descriptor.has_port("rejected"));
        assert!(!descriptor.has_port("maybe"));
    }
}
