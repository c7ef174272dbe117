use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;

use opsforge_automation::RuleDocument;
use opsforge_core::{ExpectedVersion, RuleId, TenantId};
use opsforge_events::LifecycleKind;

use super::{RuleStore, StoreError, StoredRule};

/// In-memory rule store for tests/dev.
///
/// Keeps every version of every rule; the last entry is the live one. A
/// single write lock serializes writers, so readers only ever see whole
/// documents.
#[derive(Debug, Default)]
pub struct InMemoryRuleStore {
    rules: RwLock<HashMap<(TenantId, RuleId), Vec<StoredRule>>>,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

fn poisoned() -> StoreError {
    StoreError::Storage("rule store lock poisoned".to_string())
}

impl RuleStore for InMemoryRuleStore {
    fn insert(&self, tenant_id: TenantId, document: RuleDocument) -> Result<StoredRule, StoreError> {
        let mut rules = self.rules.write().map_err(|_| poisoned())?;
        let rule_id = document.rule.id;
        if rules.contains_key(&(tenant_id, rule_id)) {
            return Err(StoreError::AlreadyExists(rule_id));
        }

        let stored = StoredRule {
            tenant_id,
            version: 1,
            document: Arc::new(document),
            updated_at: Utc::now(),
        };
        rules.insert((tenant_id, rule_id), vec![stored.clone()]);
        Ok(stored)
    }

    fn replace(
        &self,
        tenant_id: TenantId,
        document: RuleDocument,
        expected: ExpectedVersion,
    ) -> Result<StoredRule, StoreError> {
        let mut rules = self.rules.write().map_err(|_| poisoned())?;
        let rule_id = document.rule.id;
        let history = rules
            .get_mut(&(tenant_id, rule_id))
            .ok_or(StoreError::NotFound(rule_id))?;
        let current = history.last().map_or(0, |r| r.version);
        expected.check(current)?;

        let stored = StoredRule {
            tenant_id,
            version: current + 1,
            document: Arc::new(document),
            updated_at: Utc::now(),
        };
        history.push(stored.clone());
        Ok(stored)
    }

    fn get(&self, tenant_id: TenantId, rule_id: RuleId) -> Result<Option<StoredRule>, StoreError> {
        let rules = self.rules.read().map_err(|_| poisoned())?;
        Ok(rules
            .get(&(tenant_id, rule_id))
            .and_then(|history| history.last().cloned()))
    }

    fn get_version(
        &self,
        tenant_id: TenantId,
        rule_id: RuleId,
        version: u64,
    ) -> Result<Option<StoredRule>, StoreError> {
        let rules = self.rules.read().map_err(|_| poisoned())?;
        Ok(rules
            .get(&(tenant_id, rule_id))
            .and_then(|history| history.iter().find(|r| r.version == version).cloned()))
    }

    fn list(&self, tenant_id: TenantId) -> Result<Vec<StoredRule>, StoreError> {
        let rules = self.rules.read().map_err(|_| poisoned())?;
        let mut latest: Vec<StoredRule> = rules
            .iter()
            .filter(|((t, _), _)| *t == tenant_id)
            .filter_map(|(_, history)| history.last().cloned())
            .collect();
        latest.sort_by(|a, b| a.document.rule.name.cmp(&b.document.rule.name).then(a.rule_id().cmp(&b.rule_id())));
        Ok(latest)
    }

    fn remove(&self, tenant_id: TenantId, rule_id: RuleId) -> Result<StoredRule, StoreError> {
        let mut rules = self.rules.write().map_err(|_| poisoned())?;
        rules
            .remove(&(tenant_id, rule_id))
            .and_then(|mut history| history.pop())
            .ok_or(StoreError::NotFound(rule_id))
    }

    fn active_for(
        &self,
        tenant_id: TenantId,
        kind: LifecycleKind,
        entity_type: &str,
    ) -> Result<Vec<StoredRule>, StoreError> {
        Ok(self
            .list(tenant_id)?
            .into_iter()
            .filter(|stored| stored.document.rule.fires_on(kind, entity_type))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsforge_automation::{Rule, TriggerType};
    use serde_json::json;

    fn document(name: &str, trigger: TriggerType, entity_type: &str) -> RuleDocument {
        let mut doc = RuleDocument::new(Rule::new(name, trigger, entity_type));
        let a = doc.add_action("audit_log", "log", json!({ "message": "m" }));
        doc.connect_start(a);
        doc
    }

    #[test]
    fn replace_bumps_version_and_keeps_history() {
        let store = InMemoryRuleStore::new();
        let tenant = TenantId::new();
        let doc = document("r", TriggerType::OnCreate, "order");
        let rule_id = doc.rule.id;

        let v1 = store.insert(tenant, doc.clone()).unwrap();
        assert_eq!(v1.version, 1);

        let mut changed = doc.clone();
        changed.rule.name = "renamed".into();
        let v2 = store.replace(tenant, changed, ExpectedVersion::Exact(1)).unwrap();
        assert_eq!(v2.version, 2);

        assert_eq!(store.get(tenant, rule_id).unwrap().unwrap().document.rule.name, "renamed");
        assert_eq!(store.get_version(tenant, rule_id, 1).unwrap().unwrap().document.rule.name, "r");
        // The old snapshot handed out earlier is untouched.
        assert_eq!(v1.document.rule.name, "r");
    }

    #[test]
    fn stale_replace_is_a_conflict() {
        let store = InMemoryRuleStore::new();
        let tenant = TenantId::new();
        let doc = document("r", TriggerType::OnCreate, "order");
        store.insert(tenant, doc.clone()).unwrap();

        let err = store.replace(tenant, doc, ExpectedVersion::Exact(7)).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn tenants_are_isolated() {
        let store = InMemoryRuleStore::new();
        let (a, b) = (TenantId::new(), TenantId::new());
        let doc = document("r", TriggerType::OnCreate, "order");
        let rule_id = doc.rule.id;
        store.insert(a, doc).unwrap();

        assert!(store.get(b, rule_id).unwrap().is_none());
        assert!(store.list(b).unwrap().is_empty());
        assert_eq!(store.remove(b, rule_id).unwrap_err(), StoreError::NotFound(rule_id));
    }

    #[test]
    fn active_for_matches_trigger_entity_and_flag() {
        let store = InMemoryRuleStore::new();
        let tenant = TenantId::new();
        store.insert(tenant, document("created", TriggerType::OnCreate, "order")).unwrap();
        store.insert(tenant, document("updated", TriggerType::OnUpdate, "order")).unwrap();
        store.insert(tenant, document("other", TriggerType::OnCreate, "warehouse")).unwrap();
        let mut off = document("off", TriggerType::OnCreate, "order");
        off.rule.active = false;
        store.insert(tenant, off).unwrap();

        let names: Vec<_> = store
            .active_for(tenant, LifecycleKind::Created, "order")
            .unwrap()
            .into_iter()
            .map(|r| r.document.rule.name.clone())
            .collect();
        assert_eq!(names, vec!["created"]);
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let store = InMemoryRuleStore::new();
        let tenant = TenantId::new();
        let doc = document("r", TriggerType::OnCreate, "order");
        store.insert(tenant, doc.clone()).unwrap();
        assert_eq!(
            store.insert(tenant, doc.clone()).unwrap_err(),
            StoreError::AlreadyExists(doc.rule.id)
        );
    }
}
