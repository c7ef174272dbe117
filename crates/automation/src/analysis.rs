//! Lightweight complexity analysis with non-blocking suggestions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::{ActionCatalog, ActionCategory};
use crate::graph::GraphIndex;
use crate::model::RuleDocument;

/// Rules with more actions than this get a "consider splitting" suggestion.
pub const SPLIT_THRESHOLD: usize = 10;

/// Nodes with more outgoing edges than this get a "consider simplifying" suggestion.
pub const BRANCHING_THRESHOLD: usize = 3;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionCode {
    ConsiderSplitting,
    SimplifyBranching,
    NoConditionalBranching,
    NoAlertOrAudit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub code: SuggestionCode,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleAnalysis {
    pub action_count: usize,
    pub edge_count: usize,
    /// Number of actions per type key.
    pub type_histogram: BTreeMap<String, usize>,
    /// Largest out-degree of any action.
    pub max_branching: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_branching_action: Option<String>,
    pub suggestions: Vec<Suggestion>,
}

impl RuleAnalysis {
    pub fn suggests(&self, code: SuggestionCode) -> bool {
        self.suggestions.iter().any(|s| s.code == code)
    }
}

pub fn analyze(catalog: &ActionCatalog, doc: &RuleDocument) -> RuleAnalysis {
    let index = GraphIndex::build(doc);

    let mut type_histogram = BTreeMap::new();
    for action in &doc.actions {
        *type_histogram.entry(action.action_type.clone()).or_insert(0) += 1;
    }

    let (max_branching, max_branching_action) = (0..index.len())
        .map(|node| (index.outgoing(node).len(), node))
        // Ties go to the earliest action in the document.
        .fold((0, None), |(best, at), (degree, node)| {
            if degree > best {
                (degree, Some(index.action(node).name.clone()))
            } else {
                (best, at)
            }
        });

    let descriptors = || doc.actions.iter().filter_map(|a| catalog.get(&a.action_type));
    let has_conditional = descriptors().any(|d| d.is_branching() || d.category == ActionCategory::Condition);
    let has_alerting = descriptors().any(|d| matches!(d.category, ActionCategory::Alert | ActionCategory::Audit));

    let mut suggestions = Vec::new();
    let action_count = doc.actions.len();
    if action_count > SPLIT_THRESHOLD {
        suggestions.push(Suggestion {
            code: SuggestionCode::ConsiderSplitting,
            message: format!(
                "rule has {action_count} actions (more than {SPLIT_THRESHOLD}); consider splitting it into smaller rules"
            ),
        });
    }
    if max_branching > BRANCHING_THRESHOLD {
        suggestions.push(Suggestion {
            code: SuggestionCode::SimplifyBranching,
            message: format!(
                "action '{}' has {max_branching} outgoing edges (more than {BRANCHING_THRESHOLD}); consider simplifying",
                max_branching_action.as_deref().unwrap_or("?")
            ),
        });
    }
    if !has_conditional && action_count > 0 {
        suggestions.push(Suggestion {
            code: SuggestionCode::NoConditionalBranching,
            message: "rule has no conditional branching; every trigger runs the same actions".to_string(),
        });
    }
    if !has_alerting && action_count > 0 {
        suggestions.push(Suggestion {
            code: SuggestionCode::NoAlertOrAudit,
            message: "rule has no alert or audit action; failures and outcomes may go unnoticed".to_string(),
        });
    }

    RuleAnalysis {
        action_count,
        edge_count: doc.edges.len(),
        type_histogram,
        max_branching,
        max_branching_action,
        suggestions,
    }
}
