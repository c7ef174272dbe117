//! Graph model: a rule, its actions (nodes) and its edges.
//!
//! These are plain data rows as authored. Nothing here enforces the graph
//! invariants; that is the validator's job. Stored documents have always
//! passed validation.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use opsforge_core::{ActionId, EdgeId, Entity, RuleId};
use opsforge_events::LifecycleKind;

/// Which lifecycle event fires a rule.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    OnCreate,
    OnUpdate,
    OnDelete,
}

impl TriggerType {
    pub fn matches(self, kind: LifecycleKind) -> bool {
        TriggerType::from(kind) == self
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::OnCreate => "on_create",
            TriggerType::OnUpdate => "on_update",
            TriggerType::OnDelete => "on_delete",
        }
    }
}

impl From<LifecycleKind> for TriggerType {
    fn from(kind: LifecycleKind) -> Self {
        match kind {
            LifecycleKind::Created => TriggerType::OnCreate,
            LifecycleKind::Updated => TriggerType::OnUpdate,
            LifecycleKind::Deleted => TriggerType::OnDelete,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub trigger: TriggerType,
    pub entity_type: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Rule {
    pub fn new(name: impl Into<String>, trigger: TriggerType, entity_type: impl Into<String>) -> Self {
        Self {
            id: RuleId::new(),
            name: name.into(),
            description: None,
            trigger,
            entity_type: entity_type.into(),
            active: true,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Whether this rule should fire for a lifecycle event on `entity_type`.
    pub fn fires_on(&self, kind: LifecycleKind, entity_type: &str) -> bool {
        self.active && self.trigger.matches(kind) && self.entity_type == entity_type
    }
}

impl Entity for Rule {
    type Id = RuleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// A typed graph node. `config` is opaque here and validated against the
/// descriptor schema of `action_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: ActionId,
    pub rule_id: RuleId,
    #[serde(rename = "type")]
    pub action_type: String,
    pub name: String,
    #[serde(default)]
    pub config: JsonValue,
}

impl Action {
    pub fn new(
        rule_id: RuleId,
        action_type: impl Into<String>,
        name: impl Into<String>,
        config: JsonValue,
    ) -> Self {
        Self {
            id: ActionId::new(),
            rule_id,
            action_type: action_type.into(),
            name: name.into(),
            config,
        }
    }
}

impl Entity for Action {
    type Id = ActionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Start,
    Output,
    Always,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub rule_id: RuleId,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    #[serde(default)]
    pub source_action_id: Option<ActionId>,
    pub target_action_id: ActionId,
    #[serde(default)]
    pub source_output: Option<String>,
    #[serde(default)]
    pub edge_order: i32,
}

impl Edge {
    pub fn start(rule_id: RuleId, target: ActionId) -> Self {
        Self {
            id: EdgeId::new(),
            rule_id,
            edge_type: EdgeType::Start,
            source_action_id: None,
            target_action_id: target,
            source_output: None,
            edge_order: 0,
        }
    }

    pub fn output(rule_id: RuleId, source: ActionId, label: impl Into<String>, target: ActionId) -> Self {
        Self {
            id: EdgeId::new(),
            rule_id,
            edge_type: EdgeType::Output,
            source_action_id: Some(source),
            target_action_id: target,
            source_output: Some(label.into()),
            edge_order: 0,
        }
    }

    pub fn always(rule_id: RuleId, source: ActionId, target: ActionId) -> Self {
        Self {
            id: EdgeId::new(),
            rule_id,
            edge_type: EdgeType::Always,
            source_action_id: Some(source),
            target_action_id: target,
            source_output: None,
            edge_order: 0,
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.edge_order = order;
        self
    }

    pub fn is_start(&self) -> bool {
        self.edge_type == EdgeType::Start
    }
}

impl Entity for Edge {
    type Id = EdgeId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// The unit of authoring and persistence: a rule plus its whole graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDocument {
    pub rule: Rule,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl RuleDocument {
    pub fn new(rule: Rule) -> Self {
        Self {
            rule,
            actions: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn rule_id(&self) -> RuleId {
        self.rule.id
    }

    /// Add an action and return its id.
    pub fn add_action(&mut self, action_type: impl Into<String>, name: impl Into<String>, config: JsonValue) -> ActionId {
        let action = Action::new(self.rule.id, action_type, name, config);
        let id = action.id;
        self.actions.push(action);
        id
    }

    pub fn connect_start(&mut self, target: ActionId) -> &mut Edge {
        let edge = Edge::start(self.rule.id, target);
        self.push_edge(edge)
    }

    pub fn connect_output(&mut self, source: ActionId, label: impl Into<String>, target: ActionId) -> &mut Edge {
        let edge = Edge::output(self.rule.id, source, label, target);
        self.push_edge(edge)
    }

    pub fn connect_always(&mut self, source: ActionId, target: ActionId) -> &mut Edge {
        let edge = Edge::always(self.rule.id, source, target);
        self.push_edge(edge)
    }

    fn push_edge(&mut self, edge: Edge) -> &mut Edge {
        self.edges.push(edge);
        let last = self.edges.len() - 1;
        &mut self.edges[last]
    }

    pub fn action(&self, id: &ActionId) -> Option<&Action> {
        self.actions.iter().find(|a| &a.id == id)
    }

    pub fn action_by_name(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name == name)
    }
}
