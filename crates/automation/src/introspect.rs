//! Read-only queries over a rule graph: node and path explanations.
//!
//! Both operate on any document, valid or not, and never mutate it.

use std::collections::HashSet;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use opsforge_core::{ActionId, EdgeId};

use crate::catalog::{ActionCatalog, ActionCategory};
use crate::error::{AutomationError, AutomationResult};
use crate::graph::{GraphIndex, Hop, START_NODE};
use crate::model::{EdgeType, RuleDocument};

/// One edge as seen from a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRef {
    pub edge_id: EdgeId,
    pub edge_type: EdgeType,
    /// Source action name, or `(start)` for the start edge.
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_action_id: Option<ActionId>,
    pub target: String,
    pub target_action_id: ActionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeExplanation {
    pub action_id: ActionId,
    pub name: String,
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<ActionCategory>,
    pub output_ports: Vec<String>,
    pub is_entry: bool,
    /// Distance from the entry action (0 for the entry). `None` when the
    /// action cannot be reached from the start edge.
    pub depth_from_start: Option<usize>,
    pub incoming_from: Vec<EdgeRef>,
    pub outgoing_to: Vec<EdgeRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    pub action_id: ActionId,
    pub name: String,
    pub action_type: String,
    pub via: EdgeRef,
}

/// Why a path walk stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum PathStop {
    /// No outgoing edge applies.
    Terminal {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action_id: Option<ActionId>,
    },
    /// The action has unresolved output ports; re-invoke with `from` set to
    /// it and one of `outputs`.
    BranchPoint {
        action_id: ActionId,
        name: String,
        outputs: Vec<String>,
    },
    /// The walk came back to an action it already visited.
    Cycle { action_id: ActionId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathExplanation {
    pub from: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub steps: Vec<PathStep>,
    pub stop: PathStop,
    pub text_outline: String,
}

fn resolve_identifier(index: &GraphIndex<'_>, identifier: &str) -> AutomationResult<usize> {
    if let Ok(id) = identifier.parse::<ActionId>() {
        if let Some(pos) = index.position(&id) {
            return Ok(pos);
        }
    }

    let doc = index.document();
    let matches: Vec<usize> = doc
        .actions
        .iter()
        .enumerate()
        .filter(|(_, a)| a.name == identifier)
        .map(|(i, _)| i)
        .collect();

    match matches.as_slice() {
        [only] => Ok(*only),
        [] => Err(AutomationError::not_found(format!(
            "no action '{identifier}' in rule {}",
            doc.rule.id
        ))),
        many => Err(AutomationError::not_found(format!(
            "'{identifier}' is ambiguous: {} actions share that name",
            many.len()
        ))),
    }
}

fn edge_ref(index: &GraphIndex<'_>, e: usize) -> EdgeRef {
    let edge = index.edge(e);
    let name_of = |id: &ActionId| {
        index
            .position(id)
            .map(|p| index.action(p).name.clone())
            .unwrap_or_else(|| id.to_string())
    };

    EdgeRef {
        edge_id: edge.id,
        edge_type: edge.edge_type,
        source: edge
            .source_action_id
            .as_ref()
            .map_or_else(|| START_NODE.to_string(), name_of),
        source_action_id: edge.source_action_id,
        target: name_of(&edge.target_action_id),
        target_action_id: edge.target_action_id,
        output: edge.source_output.clone(),
        order: edge.edge_order,
    }
}

/// Describe one action and its neighbourhood.
///
/// `identifier` is matched against action ids first, then against names;
/// a name shared by several actions is reported as not found.
pub fn explain_node(
    catalog: &ActionCatalog,
    doc: &RuleDocument,
    identifier: &str,
) -> AutomationResult<NodeExplanation> {
    let index = GraphIndex::build(doc);
    let node = resolve_identifier(&index, identifier)?;
    let action = index.action(node);
    let descriptor = catalog.get(&action.action_type);
    let depths = index.depths();

    Ok(NodeExplanation {
        action_id: action.id,
        name: action.name.clone(),
        action_type: action.action_type.clone(),
        category: descriptor.map(|d| d.category),
        output_ports: descriptor.map(|d| d.output_ports.clone()).unwrap_or_default(),
        is_entry: index.start_targets().contains(&node),
        depth_from_start: depths[node],
        incoming_from: index.incoming(node).iter().map(|&e| edge_ref(&index, e)).collect(),
        outgoing_to: index.outgoing(node).iter().map(|&e| edge_ref(&index, e)).collect(),
    })
}

/// Walk the graph deterministically from `from` (default: the start edge).
///
/// `output` selects an exit of the `from` action and is only used for that
/// first hop; after it, always edges are followed in edge order (or the only
/// wired output, when there is exactly one) until a branch point or a
/// terminal action.
pub fn explain_path(
    doc: &RuleDocument,
    from: Option<&str>,
    output: Option<&str>,
) -> AutomationResult<PathExplanation> {
    let from_label = from.unwrap_or(START_NODE);
    if output.is_some() && from.is_none() {
        return Err(AutomationError::invalid_request(
            "'output' selects an exit of a specific action and requires 'from'",
        ));
    }

    let index = GraphIndex::build(doc);
    let mut steps: Vec<PathStep> = Vec::new();
    let mut visited = HashSet::new();
    let mut last = None;

    let mut next_edge = if from_label == START_NODE {
        if output.is_some() {
            return Err(AutomationError::invalid_request(format!(
                "{START_NODE} has no output ports"
            )));
        }
        match index.start_edges().first() {
            Some(&e) => Some(e),
            None => {
                return Err(AutomationError::invalid_request(format!(
                    "rule {} has no start edge",
                    doc.rule.id
                )));
            }
        }
    } else {
        let node = resolve_identifier(&index, from_label)?;
        visited.insert(node);
        last = Some(node);
        let hop = match output {
            Some(_) => index.resolve(node, output),
            None => unattended_hop(&index, node),
        };
        match hop {
            Hop::Edge(e) => Some(e),
            Hop::Branch(outputs) => {
                let stop = branch_stop(&index, node, outputs);
                return Ok(finish(&index, from_label, output, steps, stop));
            }
            Hop::Terminal => None,
        }
    };

    let stop = loop {
        let Some(e) = next_edge else {
            break PathStop::Terminal {
                action_id: last.map(|n| index.action(n).id),
            };
        };
        let Some(node) = index.target_of(e) else {
            break PathStop::Terminal {
                action_id: last.map(|n| index.action(n).id),
            };
        };
        let action = index.action(node);
        if !visited.insert(node) {
            break PathStop::Cycle { action_id: action.id };
        }

        steps.push(PathStep {
            action_id: action.id,
            name: action.name.clone(),
            action_type: action.action_type.clone(),
            via: edge_ref(&index, e),
        });
        last = Some(node);

        next_edge = match unattended_hop(&index, node) {
            Hop::Edge(e) => Some(e),
            Hop::Branch(outputs) => break branch_stop(&index, node, outputs),
            Hop::Terminal => None,
        };
    };

    Ok(finish(&index, from_label, output, steps, stop))
}

/// Next hop when no output was chosen. A node with a single wired output
/// leaves nothing to choose, so that output is followed.
fn unattended_hop(index: &GraphIndex<'_>, node: usize) -> Hop {
    match index.resolve(node, None) {
        Hop::Branch(outputs) if outputs.len() == 1 => index.resolve(node, Some(&outputs[0])),
        hop => hop,
    }
}

fn branch_stop(index: &GraphIndex<'_>, node: usize, outputs: Vec<String>) -> PathStop {
    let action = index.action(node);
    PathStop::BranchPoint {
        action_id: action.id,
        name: action.name.clone(),
        outputs,
    }
}

fn finish(
    index: &GraphIndex<'_>,
    from: &str,
    output: Option<&str>,
    steps: Vec<PathStep>,
    stop: PathStop,
) -> PathExplanation {
    let from_name = if from == START_NODE {
        START_NODE.to_string()
    } else {
        resolve_identifier(index, from)
            .map(|n| index.action(n).name.clone())
            .unwrap_or_else(|_| from.to_string())
    };

    let mut outline = from_name;
    for step in &steps {
        let arrow = match (&step.via.edge_type, &step.via.output) {
            (EdgeType::Output, Some(label)) => format!(" --{label}--> "),
            (EdgeType::Always, _) => " --always--> ".to_string(),
            _ => " --> ".to_string(),
        };
        let _ = write!(outline, "{arrow}{}", step.name);
    }
    let _ = match &stop {
        PathStop::Terminal { .. } => write!(outline, " [end]"),
        PathStop::BranchPoint { outputs, .. } => write!(outline, " [branch: {}]", outputs.join(" | ")),
        PathStop::Cycle { .. } => write!(outline, " [cycle]"),
    };

    PathExplanation {
        from: from.to_string(),
        output: output.map(str::to_string),
        steps,
        stop,
        text_outline: outline,
    }
}
