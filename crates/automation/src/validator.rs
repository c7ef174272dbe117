//! Structural and semantic validation of a candidate rule graph.
//!
//! Validation never fails: it always returns a [`ValidationReport`] listing
//! *every* violation found. Checks run in a fixed order:
//!
//! 1. reference integrity (ids, rule membership, action types, config
//!    schemas, edge shape, unique names)
//! 2. start-edge cardinality
//! 3. acyclicity
//! 4. reachability from the entry action
//! 5. port integrity
//! 6. edge-order ambiguity
//!
//! Checks 3 and 4 share one structural pass over the [`GraphIndex`].

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use opsforge_core::{ActionId, Entity};

use crate::catalog::ActionCatalog;
use crate::error::{AutomationError, AutomationResult};
use crate::graph::GraphIndex;
use crate::model::{EdgeType, RuleDocument};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Body could not be parsed into a rule document at all.
    MalformedDocument,
    DuplicateId,
    RuleMismatch,
    DanglingReference,
    UnknownActionType,
    /// Action config does not satisfy its type's schema.
    ConfigSchema,
    InvalidName,
    DuplicateActionName,
    MalformedEdge,
    MissingStartEdge,
    MultipleStartEdges,
    Cycle,
    Unreachable,
    UnknownPort,
    AmbiguousAlways,
    AmbiguousOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    /// Location inside the submitted document, e.g. `edges[2].source_output`.
    pub path: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_ids: Vec<ActionId>,
}

impl ValidationIssue {
    pub fn new(kind: IssueKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            message: message.into(),
            action_ids: Vec::new(),
        }
    }

    pub fn with_actions(mut self, ids: Vec<ActionId>) -> Self {
        self.action_ids = ids;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    #[serde(default)]
    pub dry_run: bool,
    pub errors: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn from_issues(errors: Vec<ValidationIssue>, dry_run: bool) -> Self {
        Self {
            valid: errors.is_empty(),
            dry_run,
            errors,
        }
    }

    /// `Ok` for a valid graph, otherwise the whole report as the error.
    pub fn ensure_valid(self) -> AutomationResult<()> {
        if self.valid {
            Ok(())
        } else {
            Err(AutomationError::Validation(self))
        }
    }

    /// Report for a body that could not be parsed into a document.
    pub fn malformed(message: impl Into<String>, dry_run: bool) -> Self {
        Self::from_issues(
            vec![ValidationIssue::new(IssueKind::MalformedDocument, "$", message)],
            dry_run,
        )
    }

    pub fn has(&self, kind: IssueKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }

    pub fn issues_of(&self, kind: IssueKind) -> impl Iterator<Item = &ValidationIssue> {
        self.errors.iter().filter(move |e| e.kind == kind)
    }
}

/// Validates rule documents against a catalog.
#[derive(Debug, Clone, Copy)]
pub struct Validator<'c> {
    catalog: &'c ActionCatalog,
}

impl<'c> Validator<'c> {
    pub fn new(catalog: &'c ActionCatalog) -> Self {
        Self { catalog }
    }

    /// Run every check. `dry_run` is echoed into the report; validation
    /// itself never has side effects.
    pub fn validate(&self, doc: &RuleDocument, dry_run: bool) -> ValidationReport {
        let mut issues = Vec::new();
        let index = GraphIndex::build(doc);

        self.check_references(doc, &mut issues);
        check_start_cardinality(doc, &mut issues);
        check_structure(&index, &mut issues);
        self.check_ports(doc, &index, &mut issues);
        check_ordering(doc, &mut issues);

        ValidationReport::from_issues(issues, dry_run)
    }

    fn check_references(&self, doc: &RuleDocument, issues: &mut Vec<ValidationIssue>) {
        let rule_id = doc.rule.id;
        let action_ids: HashSet<ActionId> = doc.actions.iter().map(|a| a.id).collect();

        let repeated_actions = repeated_ids(&doc.actions);
        let mut seen_names: HashMap<&str, usize> = HashMap::new();

        for (i, action) in doc.actions.iter().enumerate() {
            let at = format!("actions[{i}]");

            if repeated_actions[i] {
                issues.push(
                    ValidationIssue::new(
                        IssueKind::DuplicateId,
                        format!("{at}.id"),
                        format!("duplicate action id {}", action.id),
                    )
                    .with_actions(vec![action.id]),
                );
            }

            if action.rule_id != rule_id {
                issues.push(ValidationIssue::new(
                    IssueKind::RuleMismatch,
                    format!("{at}.rule_id"),
                    format!(
                        "action '{}' belongs to rule {} but the document is rule {rule_id}",
                        action.name, action.rule_id
                    ),
                ));
            }

            match self.catalog.get(&action.action_type) {
                None => issues.push(
                    ValidationIssue::new(
                        IssueKind::UnknownActionType,
                        format!("{at}.type"),
                        format!(
                            "action '{}' has unknown action type '{}'",
                            action.name, action.action_type
                        ),
                    )
                    .with_actions(vec![action.id]),
                ),
                Some(descriptor) => {
                    for violation in descriptor.config_schema.validate(&action.config) {
                        let path = match &violation.field {
                            Some(field) => format!("{at}.config.{field}"),
                            None => format!("{at}.config"),
                        };
                        issues.push(
                            ValidationIssue::new(
                                IssueKind::ConfigSchema,
                                path,
                                format!("action '{}': {}", action.name, violation.message),
                            )
                            .with_actions(vec![action.id]),
                        );
                    }
                }
            }

            let name = action.name.trim();
            if name.is_empty() {
                issues.push(ValidationIssue::new(
                    IssueKind::InvalidName,
                    format!("{at}.name"),
                    "action name must not be empty",
                ));
            } else if let Some(&first) = seen_names.get(name) {
                issues.push(
                    ValidationIssue::new(
                        IssueKind::DuplicateActionName,
                        format!("{at}.name"),
                        format!("action name '{name}' is already used by actions[{first}]"),
                    )
                    .with_actions(vec![doc.actions[first].id, action.id]),
                );
            } else {
                seen_names.insert(name, i);
            }
        }

        let repeated_edges = repeated_ids(&doc.edges);
        for (i, edge) in doc.edges.iter().enumerate() {
            let at = format!("edges[{i}]");

            if repeated_edges[i] {
                issues.push(ValidationIssue::new(
                    IssueKind::DuplicateId,
                    format!("{at}.id"),
                    format!("duplicate edge id {}", edge.id),
                ));
            }

            if edge.rule_id != rule_id {
                issues.push(ValidationIssue::new(
                    IssueKind::RuleMismatch,
                    format!("{at}.rule_id"),
                    format!("edge belongs to rule {} but the document is rule {rule_id}", edge.rule_id),
                ));
            }

            match (edge.edge_type, edge.source_action_id) {
                (EdgeType::Start, Some(_)) => issues.push(ValidationIssue::new(
                    IssueKind::MalformedEdge,
                    format!("{at}.source_action_id"),
                    "start edge must not have a source action",
                )),
                (EdgeType::Output | EdgeType::Always, None) => issues.push(ValidationIssue::new(
                    IssueKind::MalformedEdge,
                    format!("{at}.source_action_id"),
                    "non-start edge requires a source action",
                )),
                (_, Some(source)) if !action_ids.contains(&source) => issues.push(ValidationIssue::new(
                    IssueKind::DanglingReference,
                    format!("{at}.source_action_id"),
                    format!("source action {source} is not part of this rule"),
                )),
                _ => {}
            }

            if !action_ids.contains(&edge.target_action_id) {
                issues.push(ValidationIssue::new(
                    IssueKind::DanglingReference,
                    format!("{at}.target_action_id"),
                    format!("target action {} is not part of this rule", edge.target_action_id),
                ));
            }

            let label = edge.source_output.as_deref();
            match (edge.edge_type, label) {
                (EdgeType::Output, None) => issues.push(ValidationIssue::new(
                    IssueKind::MalformedEdge,
                    format!("{at}.source_output"),
                    "output edge requires a source output label",
                )),
                (EdgeType::Output, Some(l)) if l.trim().is_empty() => issues.push(ValidationIssue::new(
                    IssueKind::MalformedEdge,
                    format!("{at}.source_output"),
                    "output edge label must not be empty",
                )),
                (EdgeType::Start | EdgeType::Always, Some(_)) => issues.push(ValidationIssue::new(
                    IssueKind::MalformedEdge,
                    format!("{at}.source_output"),
                    "only output edges carry a source output label",
                )),
                _ => {}
            }
        }
    }

    fn check_ports(&self, doc: &RuleDocument, index: &GraphIndex<'_>, issues: &mut Vec<ValidationIssue>) {
        let mut always_seen: HashMap<ActionId, usize> = HashMap::new();

        for (i, edge) in doc.edges.iter().enumerate() {
            let Some(source) = edge.source_action_id else { continue };
            let Some(pos) = index.position(&source) else { continue };
            let action = index.action(pos);
            // Unknown types were already reported; nothing to check ports against.
            let Some(descriptor) = self.catalog.get(&action.action_type) else {
                continue;
            };

            match edge.edge_type {
                EdgeType::Output => {
                    let Some(label) = edge.source_output.as_deref() else { continue };
                    if !descriptor.has_port(label) {
                        let message = if descriptor.is_branching() {
                            format!(
                                "output '{label}' is not a port of action '{}' (type '{}' declares: {})",
                                action.name,
                                descriptor.key,
                                descriptor.output_ports.join(", ")
                            )
                        } else {
                            format!(
                                "action '{}' has type '{}' which declares no output ports",
                                action.name, descriptor.key
                            )
                        };
                        issues.push(
                            ValidationIssue::new(IssueKind::UnknownPort, format!("edges[{i}].source_output"), message)
                                .with_actions(vec![source]),
                        );
                    }
                }
                EdgeType::Always if !descriptor.is_branching() => {
                    if let Some(&first) = always_seen.get(&source) {
                        issues.push(
                            ValidationIssue::new(
                                IssueKind::AmbiguousAlways,
                                format!("edges[{i}]"),
                                format!(
                                    "action '{}' has no output ports and already has an always edge (edges[{first}])",
                                    action.name
                                ),
                            )
                            .with_actions(vec![source]),
                        );
                    } else {
                        always_seen.insert(source, i);
                    }
                }
                _ => {}
            }
        }
    }
}

fn check_start_cardinality(doc: &RuleDocument, issues: &mut Vec<ValidationIssue>) {
    let starts: Vec<usize> = doc
        .edges
        .iter()
        .enumerate()
        .filter(|(_, e)| e.is_start())
        .map(|(i, _)| i)
        .collect();

    match starts.len() {
        0 => issues.push(ValidationIssue::new(
            IssueKind::MissingStartEdge,
            "edges",
            "missing start edge: a rule needs exactly one",
        )),
        1 => {}
        n => {
            let ids = starts.iter().map(|&i| doc.edges[i].target_action_id).collect();
            issues.push(
                ValidationIssue::new(
                    IssueKind::MultipleStartEdges,
                    format!("edges[{}]", starts[1]),
                    format!("multiple start edges: found {n}, a rule needs exactly one"),
                )
                .with_actions(ids),
            );
        }
    }
}

fn check_structure(index: &GraphIndex<'_>, issues: &mut Vec<ValidationIssue>) {
    let structure = index.structure();

    if !structure.on_cycle.is_empty() {
        let names: Vec<&str> = structure
            .on_cycle
            .iter()
            .map(|&i| index.action(i).name.as_str())
            .collect();
        issues.push(
            ValidationIssue::new(
                IssueKind::Cycle,
                "edges",
                format!("cycle detected among actions: {}", names.join(", ")),
            )
            .with_actions(structure.on_cycle.iter().map(|&i| index.action(i).id).collect()),
        );
    }

    // Without an entry action every node would be "unreachable"; the missing
    // start edge is already reported.
    if index.start_targets().is_empty() {
        return;
    }

    for (i, reachable) in structure.reachable.iter().enumerate() {
        if !reachable {
            let action = index.action(i);
            issues.push(
                ValidationIssue::new(
                    IssueKind::Unreachable,
                    format!("actions[{i}]"),
                    format!("action '{}' is not reachable from the start edge", action.name),
                )
                .with_actions(vec![action.id]),
            );
        }
    }
}

fn check_ordering(doc: &RuleDocument, issues: &mut Vec<ValidationIssue>) {
    let mut orders: HashMap<(ActionId, Option<&str>, i32), usize> = HashMap::new();

    for (i, edge) in doc.edges.iter().enumerate() {
        let Some(source) = edge.source_action_id else { continue };
        if edge.is_start() {
            continue;
        }
        let key = (source, edge.source_output.as_deref(), edge.edge_order);
        if let Some(&first) = orders.get(&key) {
            let output = edge.source_output.as_deref().unwrap_or("always");
            issues.push(
                ValidationIssue::new(
                    IssueKind::AmbiguousOrder,
                    format!("edges[{i}].edge_order"),
                    format!(
                        "edge order {} on output '{output}' is also used by edges[{first}]",
                        edge.edge_order
                    ),
                )
                .with_actions(vec![source]),
            );
        } else {
            orders.insert(key, i);
        }
    }
}

/// `true` at every position whose id already appeared earlier in `items`.
fn repeated_ids<E: Entity>(items: &[E]) -> Vec<bool> {
    let mut seen = HashSet::new();
    items.iter().map(|item| !seen.insert(item.id())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Rule, TriggerType};
    use proptest::prelude::*;
    use serde_json::{Value as JsonValue, json};

    fn catalog() -> ActionCatalog {
        ActionCatalog::builtin()
    }

    fn alert_config() -> JsonValue {
        json!({ "severity": "warning", "message": "stock low" })
    }

    fn audit_config() -> JsonValue {
        json!({ "message": "touched" })
    }

    struct Fixture {
        doc: RuleDocument,
        a1: ActionId,
        a3: ActionId,
        a4: ActionId,
    }

    fn inventory_rule() -> Fixture {
        let mut doc = RuleDocument::new(Rule::new("stock", TriggerType::OnUpdate, "inventory_item"));
        let a1 = doc.add_action(
            "check_inventory",
            "check",
            json!({ "quantity_field": "on_hand", "minimum": 5 }),
        );
        let a2 = doc.add_action("fulfill_order", "fulfill", json!({}));
        let a3 = doc.add_action(
            "send_notification",
            "notify",
            json!({ "recipients": ["ops"], "template": "low_stock" }),
        );
        let a4 = doc.add_action("create_alert", "alert", alert_config());
        doc.connect_start(a1);
        doc.connect_output(a1, "sufficient", a2);
        doc.connect_output(a1, "insufficient", a3);
        doc.connect_always(a3, a4);
        Fixture { doc, a1, a3, a4 }
    }

    fn validate(doc: &RuleDocument) -> ValidationReport {
        let catalog = catalog();
        Validator::new(&catalog).validate(doc, false)
    }

    #[test]
    fn well_formed_graph_is_valid() {
        let report = validate(&inventory_rule().doc);
        assert!(report.valid, "{:?}", report.errors);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn dry_run_flag_is_echoed() {
        let catalog = catalog();
        let report = Validator::new(&catalog).validate(&inventory_rule().doc, true);
        assert!(report.valid);
        assert!(report.dry_run);
    }

    #[test]
    fn missing_start_edge_is_reported_without_unreachable_noise() {
        let mut f = inventory_rule();
        f.doc.edges.retain(|e| !e.is_start());

        let report = validate(&f.doc);
        assert!(report.has(IssueKind::MissingStartEdge));
        assert!(!report.has(IssueKind::Unreachable));
    }

    #[test]
    fn multiple_start_edges_are_reported() {
        let mut f = inventory_rule();
        f.doc.connect_start(f.a3);

        let report = validate(&f.doc);
        assert!(report.has(IssueKind::MultipleStartEdges));
        assert!(!report.has(IssueKind::MissingStartEdge));
    }

    #[test]
    fn back_edge_reports_cycle_with_both_endpoints() {
        let mut f = inventory_rule();
        f.doc.connect_always(f.a4, f.a1);

        let report = validate(&f.doc);
        let cycle = report.issues_of(IssueKind::Cycle).next().expect("cycle issue");
        assert!(cycle.action_ids.contains(&f.a4));
        assert!(cycle.action_ids.contains(&f.a1));
    }

    #[test]
    fn all_violations_are_accumulated() {
        let mut f = inventory_rule();
        let orphan = f.doc.add_action("create_alert", "orphan", json!({ "severity": "loud" }));
        f.doc.add_action("audit_log", "check", audit_config());
        f.doc.add_action("teleport", "beam", json!({}));
        f.doc.connect_output(f.a1, "maybe", f.a4);
        f.doc.connect_always(f.a1, ActionId::new());

        let report = validate(&f.doc);
        assert!(!report.valid);
        for kind in [
            IssueKind::ConfigSchema,
            IssueKind::DuplicateActionName,
            IssueKind::UnknownActionType,
            IssueKind::UnknownPort,
            IssueKind::DanglingReference,
            IssueKind::Unreachable,
        ] {
            assert!(report.has(kind), "expected {kind:?} in {:?}", report.errors);
        }

        let schema_paths: Vec<_> = report
            .issues_of(IssueKind::ConfigSchema)
            .map(|i| i.path.as_str())
            .collect();
        assert_eq!(schema_paths, vec!["actions[4].config.severity", "actions[4].config.message"]);

        let unreachable: Vec<_> = report
            .issues_of(IssueKind::Unreachable)
            .flat_map(|i| i.action_ids.iter().copied())
            .collect();
        assert!(unreachable.contains(&orphan));
    }

    #[test]
    fn port_less_source_allows_only_one_always_edge() {
        let mut f = inventory_rule();
        let extra = f.doc.add_action("audit_log", "audit", audit_config());
        f.doc.connect_always(f.a3, extra).edge_order = 1;

        let report = validate(&f.doc);
        let issue = report.issues_of(IssueKind::AmbiguousAlways).next().expect("ambiguous always");
        assert_eq!(issue.path, "edges[4]");
        assert_eq!(issue.action_ids, vec![f.a3]);
    }

    #[test]
    fn output_label_on_port_less_type_is_rejected() {
        let mut f = inventory_rule();
        let extra = f.doc.add_action("audit_log", "audit", audit_config());
        f.doc.connect_output(f.a4, "done", extra);

        let report = validate(&f.doc);
        let issue = report.issues_of(IssueKind::UnknownPort).next().expect("unknown port");
        assert!(issue.message.contains("declares no output ports"));
    }

    #[test]
    fn duplicate_orders_on_same_output_are_ambiguous() {
        let mut f = inventory_rule();
        let extra = f.doc.add_action("audit_log", "audit", audit_config());
        f.doc.connect_output(f.a1, "insufficient", extra);

        let report = validate(&f.doc);
        let issue = report.issues_of(IssueKind::AmbiguousOrder).next().expect("ambiguous order");
        assert_eq!(issue.path, "edges[4].edge_order");

        f.doc.edges[4].edge_order = 1;
        assert!(validate(&f.doc).valid);
    }

    #[test]
    fn edge_shape_is_checked() {
        let mut f = inventory_rule();
        f.doc.edges[1].source_output = None;
        f.doc.edges[3].source_output = Some("x".into());

        let report = validate(&f.doc);
        let paths: Vec<_> = report
            .issues_of(IssueKind::MalformedEdge)
            .map(|i| i.path.as_str())
            .collect();
        assert_eq!(paths, vec!["edges[1].source_output", "edges[3].source_output"]);
    }

    #[test]
    fn foreign_rule_rows_are_rejected() {
        let mut f = inventory_rule();
        f.doc.actions[0].rule_id = opsforge_core::RuleId::new();

        let report = validate(&f.doc);
        let issue = report.issues_of(IssueKind::RuleMismatch).next().expect("mismatch");
        assert_eq!(issue.path, "actions[0].rule_id");
    }

    #[test]
    fn ensure_valid_carries_the_full_report() {
        let f = inventory_rule();
        assert_eq!(Validator::new(&catalog()).validate(&f.doc, false).ensure_valid(), Ok(()));

        let mut broken = f.doc.clone();
        broken.edges.clear();
        let report = Validator::new(&catalog()).validate(&broken, false);
        let expected = report.clone();
        assert_eq!(report.ensure_valid(), Err(AutomationError::Validation(expected)));
    }

    #[test]
    fn malformed_report_points_at_document_root() {
        let report = ValidationReport::malformed("expected value at line 1 column 1", true);
        assert!(!report.valid);
        assert_eq!(report.errors[0].path, "$");
        assert_eq!(report.errors[0].kind, IssueKind::MalformedDocument);
    }

    /// A random valid chain-with-branches graph: each new audit action hangs
    /// off an earlier node through an always edge, or off a condition node
    /// through one of its ports.
    fn arb_valid_graph() -> impl Strategy<Value = RuleDocument> {
        prop::collection::vec((any::<bool>(), any::<prop::sample::Index>()), 0..24).prop_map(|shape| {
            let mut doc = RuleDocument::new(Rule::new("generated", TriggerType::OnCreate, "order"));
            let root = doc.add_action(
                "condition",
                "root",
                json!({ "field": "status", "operator": "eq", "value": "open" }),
            );
            doc.connect_start(root);

            // (action id, is_condition, used ports / used always)
            let mut slots: Vec<(ActionId, bool, Vec<&'static str>)> = vec![(root, true, vec![])];
            for (i, (as_condition, pick)) in shape.into_iter().enumerate() {
                let open: Vec<usize> = slots
                    .iter()
                    .enumerate()
                    .filter(|(_, (_, cond, used))| if *cond { used.len() < 2 } else { used.is_empty() })
                    .map(|(j, _)| j)
                    .collect();
                if open.is_empty() {
                    break;
                }
                let parent = open[pick.index(open.len())];

                let id = if as_condition {
                    doc.add_action(
                        "condition",
                        format!("cond_{i}"),
                        json!({ "field": "total", "operator": "gt", "value": i }),
                    )
                } else {
                    doc.add_action("audit_log", format!("audit_{i}"), audit_config())
                };

                let (parent_id, parent_is_cond, used) = &mut slots[parent];
                if *parent_is_cond {
                    let port = if used.contains(&"true") { "false" } else { "true" };
                    used.push(port);
                    doc.connect_output(*parent_id, port, id);
                } else {
                    used.push("always");
                    doc.connect_always(*parent_id, id);
                }
                slots.push((id, as_condition, vec![]));
            }
            doc
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

        #[test]
        fn generated_valid_graphs_have_no_errors(doc in arb_valid_graph()) {
            let report = validate(&doc);
            prop_assert!(report.valid, "{:?}", report.errors);
        }

        #[test]
        fn start_edge_count_drives_start_issues(doc in arb_valid_graph(), extra in 0usize..3, drop_start in any::<bool>()) {
            let mut doc = doc;
            if drop_start {
                doc.edges.retain(|e| !e.is_start());
            }
            let target = doc.actions[0].id;
            for _ in 0..extra {
                doc.connect_start(target);
            }
            let starts = doc.edges.iter().filter(|e| e.is_start()).count();

            let report = validate(&doc);
            prop_assert_eq!(report.has(IssueKind::MissingStartEdge), starts == 0);
            prop_assert_eq!(report.has(IssueKind::MultipleStartEdges), starts > 1);
        }

        #[test]
        fn back_edge_always_yields_cycle_with_endpoints(doc in arb_valid_graph(), pick in any::<prop::sample::Index>()) {
            let mut doc = doc;
            // Close a loop from some node back to the root.
            let from = doc.actions[pick.index(doc.actions.len())].id;
            let root = doc.actions[0].id;
            doc.connect_always(from, root).edge_order = 1000;

            let report = validate(&doc);
            let cycle = report.issues_of(IssueKind::Cycle).next();
            prop_assert!(cycle.is_some());
            let ids = &cycle.unwrap().action_ids;
            prop_assert!(ids.contains(&from));
            prop_assert!(ids.contains(&root));
        }

        #[test]
        fn depth_never_decreases_along_edges(doc in arb_valid_graph()) {
            let index = GraphIndex::build(&doc);
            let depths = index.depths();
            prop_assert_eq!(depths[index.entry().unwrap()], Some(0));
            for node in 0..index.len() {
                for &e in index.outgoing(node) {
                    let target = index.target_of(e).unwrap();
                    prop_assert!(depths[node].unwrap() < depths[target].unwrap());
                }
            }
        }
    }
}
