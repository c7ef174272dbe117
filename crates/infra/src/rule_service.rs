//! Rule authoring and read-side operations.
//!
//! Every write runs the same validation routine as a dry run first; any
//! violation rejects the whole document and the stored version is left
//! untouched. Introspection and analysis work on the latest stored snapshot.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use opsforge_automation::{
    Action, ActionCatalog, AutomationError, Edge, NodeExplanation, PathExplanation, RuleAnalysis, RuleDocument,
    ValidationReport, Validator, analyze, explain_node, explain_path,
};
use opsforge_core::{ExpectedVersion, RuleId, TenantId};

use crate::rule_store::{RuleStore, StoreError, StoredRule};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ServiceError {
    /// The document failed validation; nothing was written.
    #[error("rule graph is invalid ({} error(s))", .0.errors.len())]
    Invalid(ValidationReport),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Duplicate id or stale expected version.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(id) => ServiceError::NotFound(format!("rule {id}")),
            StoreError::AlreadyExists(id) => ServiceError::Conflict(format!("rule {id} already exists")),
            StoreError::Conflict(msg) => ServiceError::Conflict(msg),
            StoreError::Storage(msg) => ServiceError::Storage(msg),
        }
    }
}

impl From<AutomationError> for ServiceError {
    fn from(value: AutomationError) -> Self {
        match value {
            AutomationError::Validation(report) => ServiceError::Invalid(report),
            AutomationError::NotFound(what) => ServiceError::NotFound(what),
            AutomationError::InvalidRequest(msg) => ServiceError::InvalidRequest(msg),
        }
    }
}

pub struct RuleService<S> {
    store: S,
    catalog: Arc<ActionCatalog>,
}

impl<S: RuleStore> RuleService<S> {
    pub fn new(store: S, catalog: Arc<ActionCatalog>) -> Self {
        Self { store, catalog }
    }

    pub fn catalog(&self) -> &ActionCatalog {
        &self.catalog
    }

    /// Validate without persisting anything.
    pub fn dry_run(&self, document: &RuleDocument) -> ValidationReport {
        Validator::new(&self.catalog).validate(document, true)
    }

    fn validate_for_write(&self, document: &RuleDocument) -> Result<(), ServiceError> {
        let report = Validator::new(&self.catalog).validate(document, false);
        if !report.valid {
            debug!(rule_id = %document.rule.id, errors = report.errors.len(), "rejected invalid rule document");
        }
        Ok(report.ensure_valid()?)
    }

    pub fn create(&self, tenant_id: TenantId, document: RuleDocument) -> Result<StoredRule, ServiceError> {
        self.validate_for_write(&document)?;
        let stored = self.store.insert(tenant_id, document)?;
        info!(tenant_id = %tenant_id, rule_id = %stored.rule_id(), version = stored.version, "rule created");
        Ok(stored)
    }

    /// Replace the whole document of `rule_id`.
    pub fn update(
        &self,
        tenant_id: TenantId,
        rule_id: RuleId,
        document: RuleDocument,
        expected: ExpectedVersion,
    ) -> Result<StoredRule, ServiceError> {
        if document.rule.id != rule_id {
            return Err(ServiceError::InvalidRequest(format!(
                "document rule id {} does not match {rule_id}",
                document.rule.id
            )));
        }
        self.validate_for_write(&document)?;
        let stored = self.store.replace(tenant_id, document, expected)?;
        info!(tenant_id = %tenant_id, rule_id = %rule_id, version = stored.version, "rule replaced");
        Ok(stored)
    }

    pub fn get(&self, tenant_id: TenantId, rule_id: RuleId) -> Result<StoredRule, ServiceError> {
        self.store
            .get(tenant_id, rule_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("rule {rule_id}")))
    }

    pub fn actions(&self, tenant_id: TenantId, rule_id: RuleId) -> Result<Vec<Action>, ServiceError> {
        Ok(self.get(tenant_id, rule_id)?.document.actions.clone())
    }

    pub fn edges(&self, tenant_id: TenantId, rule_id: RuleId) -> Result<Vec<Edge>, ServiceError> {
        Ok(self.get(tenant_id, rule_id)?.document.edges.clone())
    }

    pub fn list(&self, tenant_id: TenantId) -> Result<Vec<StoredRule>, ServiceError> {
        Ok(self.store.list(tenant_id)?)
    }

    pub fn delete(&self, tenant_id: TenantId, rule_id: RuleId) -> Result<StoredRule, ServiceError> {
        let removed = self.store.remove(tenant_id, rule_id)?;
        info!(tenant_id = %tenant_id, rule_id = %rule_id, "rule deleted");
        Ok(removed)
    }

    pub fn explain_node(
        &self,
        tenant_id: TenantId,
        rule_id: RuleId,
        identifier: &str,
    ) -> Result<NodeExplanation, ServiceError> {
        let stored = self.get(tenant_id, rule_id)?;
        Ok(explain_node(&self.catalog, &stored.document, identifier)?)
    }

    pub fn explain_path(
        &self,
        tenant_id: TenantId,
        rule_id: RuleId,
        from: Option<&str>,
        output: Option<&str>,
    ) -> Result<PathExplanation, ServiceError> {
        let stored = self.get(tenant_id, rule_id)?;
        Ok(explain_path(&stored.document, from, output)?)
    }

    pub fn analyze(&self, tenant_id: TenantId, rule_id: RuleId) -> Result<RuleAnalysis, ServiceError> {
        let stored = self.get(tenant_id, rule_id)?;
        Ok(analyze(&self.catalog, &stored.document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule_store::InMemoryRuleStore;
    use opsforge_automation::{IssueKind, Rule, TriggerType};
    use serde_json::json;

    fn service() -> RuleService<Arc<InMemoryRuleStore>> {
        RuleService::new(InMemoryRuleStore::arc(), Arc::new(ActionCatalog::builtin()))
    }

    fn scenario() -> RuleDocument {
        let mut doc = RuleDocument::new(Rule::new("order stock", TriggerType::OnCreate, "sales_order"));
        let a1 = doc.add_action(
            "check_inventory",
            "check",
            json!({ "quantity_field": "qty", "minimum": 1 }),
        );
        let a2 = doc.add_action("fulfill_order", "fulfil", json!({}));
        let a3 = doc.add_action(
            "send_notification",
            "notify",
            json!({ "recipients": ["buyer"], "template": "backorder" }),
        );
        let a4 = doc.add_action(
            "create_alert",
            "alert",
            json!({ "severity": "critical", "message": "out of stock" }),
        );
        doc.connect_start(a1);
        doc.connect_output(a1, "sufficient", a2);
        doc.connect_output(a1, "insufficient", a3);
        doc.connect_always(a3, a4);
        doc
    }

    #[test]
    fn dry_run_never_writes() {
        let service = service();
        let tenant = TenantId::new();
        let doc = scenario();

        let report = service.dry_run(&doc);
        assert!(report.valid);
        assert!(report.dry_run);
        assert!(service.list(tenant).unwrap().is_empty());
    }

    #[test]
    fn invalid_update_leaves_previous_version_intact() {
        let service = service();
        let tenant = TenantId::new();
        let doc = scenario();
        let rule_id = doc.rule.id;
        service.create(tenant, doc.clone()).unwrap();

        let mut broken = doc;
        broken.edges.retain(|e| !e.is_start());
        let err = service
            .update(tenant, rule_id, broken, ExpectedVersion::Any)
            .unwrap_err();
        match err {
            ServiceError::Invalid(report) => assert!(report.has(IssueKind::MissingStartEdge)),
            other => panic!("expected validation failure, got {other:?}"),
        }

        let stored = service.get(tenant, rule_id).unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(service.edges(tenant, rule_id).unwrap().len(), 4);
    }

    #[test]
    fn update_requires_matching_rule_id_and_version() {
        let service = service();
        let tenant = TenantId::new();
        let doc = scenario();
        let rule_id = doc.rule.id;
        service.create(tenant, doc.clone()).unwrap();

        assert!(matches!(
            service.update(tenant, RuleId::new(), doc.clone(), ExpectedVersion::Any),
            Err(ServiceError::InvalidRequest(_))
        ));
        assert!(matches!(
            service.update(tenant, rule_id, doc.clone(), ExpectedVersion::Exact(3)),
            Err(ServiceError::Conflict(_))
        ));
        let v2 = service
            .update(tenant, rule_id, doc, ExpectedVersion::Exact(1))
            .unwrap();
        assert_eq!(v2.version, 2);
    }

    #[test]
    fn introspection_reads_the_stored_rule() {
        let service = service();
        let tenant = TenantId::new();
        let doc = scenario();
        let rule_id = doc.rule.id;
        service.create(tenant, doc).unwrap();

        let node = service.explain_node(tenant, rule_id, "check").unwrap();
        assert_eq!(node.depth_from_start, Some(0));

        let path = service
            .explain_path(tenant, rule_id, Some("check"), Some("insufficient"))
            .unwrap();
        let names: Vec<_> = path.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["notify", "alert"]);

        assert!(matches!(
            service.explain_path(tenant, rule_id, None, Some("insufficient")),
            Err(ServiceError::InvalidRequest(_))
        ));
        assert!(matches!(
            service.explain_node(tenant, rule_id, "nope"),
            Err(ServiceError::NotFound(_))
        ));

        let analysis = service.analyze(tenant, rule_id).unwrap();
        assert_eq!(analysis.action_count, 4);
    }

    #[test]
    fn delete_removes_rule() {
        let service = service();
        let tenant = TenantId::new();
        let doc = scenario();
        let rule_id = doc.rule.id;
        service.create(tenant, doc).unwrap();

        service.delete(tenant, rule_id).unwrap();
        assert!(matches!(service.get(tenant, rule_id), Err(ServiceError::NotFound(_))));
        assert!(matches!(service.delete(tenant, rule_id), Err(ServiceError::NotFound(_))));
    }
}
