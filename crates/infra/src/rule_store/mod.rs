//! Rule document storage.
//!
//! A rule is persisted as one atomic whole-document write (rule + actions +
//! edges). Readers receive `Arc` snapshots, so a run that captured a snapshot
//! keeps walking it even after the rule is replaced.

mod in_memory;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use opsforge_automation::RuleDocument;
use opsforge_core::{DomainError, ExpectedVersion, RuleId, TenantId};
use opsforge_events::LifecycleKind;

pub use in_memory::InMemoryRuleStore;

/// One stored version of a rule document.
#[derive(Debug, Clone)]
pub struct StoredRule {
    pub tenant_id: TenantId,
    /// 1 on create, +1 on every replace.
    pub version: u64,
    pub document: Arc<RuleDocument>,
    pub updated_at: DateTime<Utc>,
}

impl StoredRule {
    pub fn rule_id(&self) -> RuleId {
        self.document.rule.id
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("rule not found: {0}")]
    NotFound(RuleId),

    #[error("rule already exists: {0}")]
    AlreadyExists(RuleId),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<DomainError> for StoreError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Conflict(msg) => StoreError::Conflict(msg),
            other => StoreError::Storage(other.to_string()),
        }
    }
}

/// Tenant-scoped, versioned rule storage.
pub trait RuleStore: Send + Sync {
    /// Store a brand-new rule at version 1.
    fn insert(&self, tenant_id: TenantId, document: RuleDocument) -> Result<StoredRule, StoreError>;

    /// Atomically replace the whole document of an existing rule.
    fn replace(
        &self,
        tenant_id: TenantId,
        document: RuleDocument,
        expected: ExpectedVersion,
    ) -> Result<StoredRule, StoreError>;

    /// Latest version of a rule.
    fn get(&self, tenant_id: TenantId, rule_id: RuleId) -> Result<Option<StoredRule>, StoreError>;

    /// A specific historical version of a rule.
    fn get_version(
        &self,
        tenant_id: TenantId,
        rule_id: RuleId,
        version: u64,
    ) -> Result<Option<StoredRule>, StoreError>;

    /// Latest version of every rule of a tenant.
    fn list(&self, tenant_id: TenantId) -> Result<Vec<StoredRule>, StoreError>;

    /// Delete a rule and its history, returning the last version.
    fn remove(&self, tenant_id: TenantId, rule_id: RuleId) -> Result<StoredRule, StoreError>;

    /// Active rules whose trigger and target entity type match the event.
    fn active_for(
        &self,
        tenant_id: TenantId,
        kind: LifecycleKind,
        entity_type: &str,
    ) -> Result<Vec<StoredRule>, StoreError>;
}

impl<S> RuleStore for Arc<S>
where
    S: RuleStore + ?Sized,
{
    fn insert(&self, tenant_id: TenantId, document: RuleDocument) -> Result<StoredRule, StoreError> {
        (**self).insert(tenant_id, document)
    }

    fn replace(
        &self,
        tenant_id: TenantId,
        document: RuleDocument,
        expected: ExpectedVersion,
    ) -> Result<StoredRule, StoreError> {
        (**self).replace(tenant_id, document, expected)
    }

    fn get(&self, tenant_id: TenantId, rule_id: RuleId) -> Result<Option<StoredRule>, StoreError> {
        (**self).get(tenant_id, rule_id)
    }

    fn get_version(
        &self,
        tenant_id: TenantId,
        rule_id: RuleId,
        version: u64,
    ) -> Result<Option<StoredRule>, StoreError> {
        (**self).get_version(tenant_id, rule_id, version)
    }

    fn list(&self, tenant_id: TenantId) -> Result<Vec<StoredRule>, StoreError> {
        (**self).list(tenant_id)
    }

    fn remove(&self, tenant_id: TenantId, rule_id: RuleId) -> Result<StoredRule, StoreError> {
        (**self).remove(tenant_id, rule_id)
    }

    fn active_for(
        &self,
        tenant_id: TenantId,
        kind: LifecycleKind,
        entity_type: &str,
    ) -> Result<Vec<StoredRule>, StoreError> {
        (**self).active_for(tenant_id, kind, entity_type)
    }
}
