//! Per-type configuration schemas.
//!
//! Each action type owns a small, flat schema describing the fields its
//! config document may carry. Validation reports every violation, not just
//! the first.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Accepted JSON shape of a config field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Any,
    Enum { values: Vec<String> },
}

impl FieldKind {
    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldKind::Enum {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn accepts(&self, value: &JsonValue) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::Array => value.is_array(),
            FieldKind::Object => value.is_object(),
            FieldKind::Any => true,
            FieldKind::Enum { values } => value
                .as_str()
                .is_some_and(|s| values.iter().any(|v| v == s)),
        }
    }

    fn describe(&self) -> String {
        match self {
            FieldKind::String => "string".to_string(),
            FieldKind::Number => "number".to_string(),
            FieldKind::Integer => "integer".to_string(),
            FieldKind::Boolean => "boolean".to_string(),
            FieldKind::Array => "array".to_string(),
            FieldKind::Object => "object".to_string(),
            FieldKind::Any => "any value".to_string(),
            FieldKind::Enum { values } => format!("one of [{}]", values.join(", ")),
        }
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// One field of a config schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A single schema violation. `field` is `None` for document-level problems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub field: Option<String>,
    pub message: String,
}

/// Flat config schema: a JSON object with typed, optionally required fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub allow_unknown: bool,
}

impl ConfigSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            kind,
            required: true,
            description: None,
        });
        self
    }

    pub fn optional(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            kind,
            required: false,
            description: None,
        });
        self
    }

    /// Attach a description to the most recently added field.
    pub fn described(mut self, description: impl Into<String>) -> Self {
        if let Some(last) = self.fields.last_mut() {
            last.description = Some(description.into());
        }
        self
    }

    pub fn allow_unknown(mut self) -> Self {
        self.allow_unknown = true;
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Validate a config document, returning every violation found.
    ///
    /// `null` is treated as an empty object so that action types without
    /// required fields accept an omitted config.
    pub fn validate(&self, config: &JsonValue) -> Vec<SchemaViolation> {
        let empty = serde_json::Map::new();
        let object = match config {
            JsonValue::Object(map) => map,
            JsonValue::Null => &empty,
            other => {
                return vec![SchemaViolation {
                    field: None,
                    message: format!("config must be a JSON object, found {}", json_type_name(other)),
                }];
            }
        };

        let mut violations = Vec::new();

        for spec in &self.fields {
            match object.get(&spec.name) {
                None | Some(JsonValue::Null) if spec.required => violations.push(SchemaViolation {
                    field: Some(spec.name.clone()),
                    message: format!("missing required field '{}'", spec.name),
                }),
                None | Some(JsonValue::Null) => {}
                Some(value) if !spec.kind.accepts(value) => violations.push(SchemaViolation {
                    field: Some(spec.name.clone()),
                    message: format!(
                        "field '{}' expected {}, found {}",
                        spec.name,
                        spec.kind.describe(),
                        describe_value(value)
                    ),
                }),
                Some(_) => {}
            }
        }

        if !self.allow_unknown {
            for key in object.keys() {
                if self.field(key).is_none() {
                    violations.push(SchemaViolation {
                        field: Some(key.clone()),
                        message: format!("unknown field '{key}'"),
                    });
                }
            }
        }

        violations
    }
}

fn describe_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => format!("string \"{s}\""),
        other => json_type_name(other).to_string(),
    }
}
