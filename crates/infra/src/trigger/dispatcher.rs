//! Trigger dispatch: lifecycle event → matching rules → one run per rule.
//!
//! ```text
//! EventEnvelope<EntityChanged>
//!   ↓
//! 1. Select active rules whose trigger + entity type match (tenant-scoped)
//!   ↓
//! 2. Look up earlier runs of (event id, rule id); the redelivery policy
//!    decides start / retry / skip
//!   ↓
//! 3. Begin a run record against the rule snapshot
//!   ↓
//! 4. Walk the graph, appending each step to the run log as it happens
//!   ↓
//! 5. Finish the run (succeeded / failed) with its final context
//! ```
//!
//! Each rule is dispatched independently: a failing handler, a missing
//! snapshot or a run log error for one rule is recorded in the report and
//! the remaining rules still run. Earlier actions of a failed run are not
//! rolled back.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use opsforge_automation::execution::DEFAULT_MAX_STEPS;
use opsforge_automation::{
    ActionCatalog, HandlerRegistry, RunContext, RunRecord, RunStatus, StartPoint, TriggerEvent, WalkRequest, Walker,
};
use opsforge_core::{RuleId, RunId, TenantId};
use opsforge_events::{EntityChanged, Event, EventEnvelope};

use crate::rule_store::{RuleStore, StoreError, StoredRule};
use crate::run_log::{RunLog, RunLogError};
use crate::trigger::policy::{DeliveryDecision, RedeliveryPolicy, ResumeMode, SkipReason};

/// Dispatcher settings. There is no `Default`: the redelivery policy must be
/// chosen explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    pub policy: RedeliveryPolicy,
    /// Upper bound on actions executed per run.
    pub max_steps: usize,
}

impl DispatcherConfig {
    pub fn new(policy: RedeliveryPolicy) -> Self {
        Self {
            policy,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    RunLog(#[from] RunLogError),

    #[error("rule {rule_id} version {version} is no longer stored")]
    SnapshotMissing { rule_id: RuleId, version: u64 },
}

/// What happened for one matching rule.
#[derive(Debug, Clone)]
pub enum RuleDispatch {
    Ran { rule_id: RuleId, run: Box<RunRecord> },
    Skipped { rule_id: RuleId, reason: SkipReason },
    Errored { rule_id: RuleId, error: String },
}

impl RuleDispatch {
    pub fn rule_id(&self) -> RuleId {
        match self {
            RuleDispatch::Ran { rule_id, .. }
            | RuleDispatch::Skipped { rule_id, .. }
            | RuleDispatch::Errored { rule_id, .. } => *rule_id,
        }
    }

    pub fn run(&self) -> Option<&RunRecord> {
        match self {
            RuleDispatch::Ran { run, .. } => Some(&**run),
            _ => None,
        }
    }
}

/// Result of dispatching one event.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub tenant_id: TenantId,
    pub event_id: Uuid,
    pub outcomes: Vec<RuleDispatch>,
}

impl DispatchReport {
    pub fn runs(&self) -> impl Iterator<Item = &RunRecord> {
        self.outcomes.iter().filter_map(RuleDispatch::run)
    }

    pub fn succeeded(&self) -> usize {
        self.runs().filter(|r| r.status == RunStatus::Succeeded).count()
    }

    pub fn failed(&self) -> usize {
        self.runs().filter(|r| r.status.is_failed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, RuleDispatch::Skipped { .. }))
            .count()
    }

    pub fn errored(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, RuleDispatch::Errored { .. }))
            .count()
    }
}

/// Matches lifecycle events to active rules and executes them.
///
/// Composes a [`RuleStore`] (rule snapshots) and a [`RunLog`] (audit trail)
/// with the shared catalog and handler registry. Contains no IO itself.
pub struct TriggerDispatcher<S, L> {
    rules: S,
    runs: L,
    catalog: Arc<ActionCatalog>,
    handlers: Arc<HandlerRegistry>,
    config: DispatcherConfig,
}

impl<S, L> TriggerDispatcher<S, L>
where
    S: RuleStore,
    L: RunLog,
{
    pub fn new(
        rules: S,
        runs: L,
        catalog: Arc<ActionCatalog>,
        handlers: Arc<HandlerRegistry>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            rules,
            runs,
            catalog,
            handlers,
            config,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn runs(&self) -> &L {
        &self.runs
    }

    /// Dispatch one lifecycle event to every matching active rule.
    ///
    /// Only a failure to list the matching rules aborts the whole dispatch.
    pub fn dispatch(&self, envelope: &EventEnvelope<EntityChanged>) -> Result<DispatchReport, DispatchError> {
        let tenant_id = envelope.tenant_id();
        let trigger = TriggerEvent::from(envelope);
        let matching = self.rules.active_for(tenant_id, trigger.kind, &trigger.entity_type)?;

        debug!(
            tenant_id = %tenant_id,
            event_id = %trigger.event_id,
            event_type = %envelope.payload().event_type(),
            rules = matching.len(),
            "dispatching lifecycle event"
        );

        let outcomes = matching
            .into_iter()
            .map(|stored| {
                let rule_id = stored.rule_id();
                self.dispatch_rule(tenant_id, &trigger, stored)
                    .unwrap_or_else(|err| {
                        warn!(tenant_id = %tenant_id, rule_id = %rule_id, error = %err, "rule dispatch failed");
                        RuleDispatch::Errored {
                            rule_id,
                            error: err.to_string(),
                        }
                    })
            })
            .collect();

        Ok(DispatchReport {
            tenant_id,
            event_id: trigger.event_id,
            outcomes,
        })
    }

    fn dispatch_rule(
        &self,
        tenant_id: TenantId,
        trigger: &TriggerEvent,
        stored: StoredRule,
    ) -> Result<RuleDispatch, DispatchError> {
        let rule_id = stored.rule_id();
        let previous = self.runs.find_for_trigger(tenant_id, trigger.event_id, rule_id)?;

        match self.config.policy.decide(&previous) {
            DeliveryDecision::Skip { reason } => {
                debug!(tenant_id = %tenant_id, rule_id = %rule_id, event_id = %trigger.event_id, %reason, "delivery skipped");
                Ok(RuleDispatch::Skipped { rule_id, reason })
            }
            DeliveryDecision::Start { attempt } => {
                self.execute(tenant_id, &stored, trigger, attempt, StartPoint::Entry, None)
            }
            DeliveryDecision::Retry {
                attempt,
                previous,
                mode: ResumeMode::Restart,
            } => {
                info!(rule_id = %rule_id, previous_run = %previous.id, attempt, "restarting failed run");
                self.execute(tenant_id, &stored, trigger, attempt, StartPoint::Entry, None)
            }
            DeliveryDecision::Retry {
                attempt,
                previous,
                mode: ResumeMode::Resume,
            } => {
                let snapshot = self
                    .rules
                    .get_version(tenant_id, rule_id, previous.rule_version)?
                    .ok_or(DispatchError::SnapshotMissing {
                        rule_id,
                        version: previous.rule_version,
                    })?;
                let start = previous.failed_action().map_or(StartPoint::Entry, StartPoint::Action);
                info!(rule_id = %rule_id, previous_run = %previous.id, attempt, version = snapshot.version, "resuming failed run");

                let previous = *previous;
                self.execute(
                    tenant_id,
                    &snapshot,
                    trigger,
                    attempt,
                    start,
                    Some((previous.id, previous.context)),
                )
            }
        }
    }

    fn execute(
        &self,
        tenant_id: TenantId,
        stored: &StoredRule,
        trigger: &TriggerEvent,
        attempt: u32,
        start: StartPoint,
        resume: Option<(RunId, RunContext)>,
    ) -> Result<RuleDispatch, DispatchError> {
        let rule_id = stored.rule_id();
        let mut record = RunRecord::begin(tenant_id, rule_id, stored.version, trigger.clone(), attempt);
        if let Some((previous, context)) = resume {
            record = record.resuming(previous, context);
        }
        let run_id = record.id;
        let context = record.context.clone();
        self.runs.begin(record)?;

        info!(
            tenant_id = %tenant_id,
            rule_id = %rule_id,
            run_id = %run_id,
            version = stored.version,
            attempt,
            "run started"
        );

        let walker = Walker::new(&self.catalog, &self.handlers).with_max_steps(self.config.max_steps);
        let mut log_error: Option<RunLogError> = None;
        let outcome = walker.walk(
            WalkRequest {
                tenant_id,
                rule_id,
                run_id,
                document: &stored.document,
                trigger,
                start,
                context,
            },
            &mut |step| {
                if log_error.is_none() {
                    if let Err(err) = self.runs.append_step(tenant_id, run_id, step.clone()) {
                        log_error = Some(err);
                    }
                }
            },
        );

        let status = match (log_error, &outcome.result) {
            (Some(err), _) => RunStatus::Failed {
                action_id: outcome.failed_action,
                error: format!("failed to record step: {err}"),
            },
            (None, Ok(())) => RunStatus::Succeeded,
            (None, Err(err)) => RunStatus::Failed {
                action_id: outcome.failed_action,
                error: err.to_string(),
            },
        };

        let run = self.runs.finish(tenant_id, run_id, status, outcome.context)?;
        match &run.status {
            RunStatus::Failed { error, .. } => {
                warn!(rule_id = %rule_id, run_id = %run_id, steps = run.steps.len(), error = %error, "run failed");
            }
            _ => {
                info!(rule_id = %rule_id, run_id = %run_id, steps = run.steps.len(), "run succeeded");
            }
        }

        Ok(RuleDispatch::Ran {
            rule_id,
            run: Box::new(run),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule_store::InMemoryRuleStore;
    use crate::run_log::InMemoryRunLog;
    use opsforge_automation::{HandlerError, HandlerOutcome, Rule, RuleDocument, StepOutcome, TriggerType};
    use opsforge_core::ExpectedVersion;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    type Dispatcher = TriggerDispatcher<Arc<InMemoryRuleStore>, Arc<InMemoryRunLog>>;

    fn dispatcher(policy: RedeliveryPolicy, handlers: HandlerRegistry) -> (Dispatcher, Arc<InMemoryRuleStore>) {
        let store = InMemoryRuleStore::arc();
        let dispatcher = TriggerDispatcher::new(
            store.clone(),
            InMemoryRunLog::arc(),
            Arc::new(ActionCatalog::builtin()),
            Arc::new(handlers),
            DispatcherConfig::new(policy),
        );
        (dispatcher, store)
    }

    /// start → check (sufficient → fulfil, insufficient → notify → alert)
    fn inventory_rule() -> RuleDocument {
        let mut doc = RuleDocument::new(Rule::new("restock", TriggerType::OnUpdate, "inventory_item"));
        let check = doc.add_action(
            "check_inventory",
            "check",
            json!({ "quantity_field": "on_hand", "minimum": 5 }),
        );
        let fulfil = doc.add_action("fulfill_order", "fulfil", json!({}));
        let notify = doc.add_action(
            "send_notification",
            "notify",
            json!({ "recipients": ["ops@example.com"], "template": "low_stock" }),
        );
        let alert = doc.add_action(
            "create_alert",
            "alert",
            json!({ "severity": "warning", "message": "low stock" }),
        );
        doc.connect_start(check);
        doc.connect_output(check, "sufficient", fulfil);
        doc.connect_output(check, "insufficient", notify);
        doc.connect_always(notify, alert);
        doc
    }

    fn updated(tenant_id: TenantId, on_hand: i64) -> EventEnvelope<EntityChanged> {
        EventEnvelope::wrap(
            tenant_id,
            EntityChanged::updated("inventory_item", "item-1", json!({ "on_hand": on_hand })),
        )
    }

    fn step_names(run: &RunRecord) -> Vec<&str> {
        run.steps.iter().map(|s| s.action_name.as_str()).collect()
    }

    /// Built-in handlers with `send_notification` failing on its first `failures` calls.
    fn flaky_notifications(failures: u32) -> HandlerRegistry {
        let calls = AtomicU32::new(0);
        let mut handlers = HandlerRegistry::with_builtins();
        handlers.register_fn("send_notification", move |_| {
            if calls.fetch_add(1, Ordering::SeqCst) < failures {
                Err(HandlerError::failed("smtp unavailable"))
            } else {
                Ok(HandlerOutcome::done().with_data(json!({ "sent": true })))
            }
        });
        handlers
    }

    #[test]
    fn walks_the_branch_chosen_by_the_payload() {
        let (dispatcher, store) = dispatcher(RedeliveryPolicy::RunEveryDelivery, HandlerRegistry::with_builtins());
        let tenant = TenantId::new();
        store.insert(tenant, inventory_rule()).unwrap();

        let low = dispatcher.dispatch(&updated(tenant, 2)).unwrap();
        let run = low.runs().next().unwrap();
        assert_eq!(run.status, RunStatus::Succeeded);
        assert_eq!(step_names(run), vec!["check", "notify", "alert"]);
        assert!(run.context.output_of("alert").is_some());

        let high = dispatcher.dispatch(&updated(tenant, 50)).unwrap();
        assert_eq!(step_names(high.runs().next().unwrap()), vec!["check", "fulfil"]);
    }

    #[test]
    fn non_matching_events_start_nothing() {
        let (dispatcher, store) = dispatcher(RedeliveryPolicy::RunEveryDelivery, HandlerRegistry::with_builtins());
        let tenant = TenantId::new();
        store.insert(tenant, inventory_rule()).unwrap();

        let created = EventEnvelope::wrap(tenant, EntityChanged::created("inventory_item", "i", json!({})));
        assert!(dispatcher.dispatch(&created).unwrap().outcomes.is_empty());

        let other_tenant = dispatcher.dispatch(&updated(TenantId::new(), 1)).unwrap();
        assert!(other_tenant.outcomes.is_empty());
    }

    #[test]
    fn handler_failure_fails_the_run_and_keeps_earlier_steps() {
        let (dispatcher, store) = dispatcher(RedeliveryPolicy::RunEveryDelivery, flaky_notifications(u32::MAX));
        let tenant = TenantId::new();
        let doc = inventory_rule();
        let notify = doc.action_by_name("notify").unwrap().id;
        store.insert(tenant, doc).unwrap();

        let report = dispatcher.dispatch(&updated(tenant, 0)).unwrap();
        let run = report.runs().next().unwrap();

        assert_eq!(report.failed(), 1);
        assert_eq!(run.failed_action(), Some(notify));
        assert_eq!(step_names(run), vec!["check", "notify"]);
        assert!(run.steps[0].outcome.is_success());
        assert!(matches!(run.steps[1].outcome, StepOutcome::Failed { .. }));

        let logged = dispatcher.runs().get(tenant, run.id).unwrap().unwrap();
        assert_eq!(logged.steps.len(), 2);
        assert!(logged.status.is_failed());
    }

    #[test]
    fn ignore_duplicates_skips_redelivery() {
        let (dispatcher, store) = dispatcher(RedeliveryPolicy::IgnoreDuplicates, HandlerRegistry::with_builtins());
        let tenant = TenantId::new();
        store.insert(tenant, inventory_rule()).unwrap();

        let event = updated(tenant, 1);
        assert_eq!(dispatcher.dispatch(&event).unwrap().succeeded(), 1);
        assert_eq!(dispatcher.dispatch(&event).unwrap().skipped(), 1);
    }

    #[test]
    fn restart_walks_from_entry_again() {
        let policy = RedeliveryPolicy::retry_failed(ResumeMode::Restart, 3);
        let (dispatcher, store) = dispatcher(policy, flaky_notifications(1));
        let tenant = TenantId::new();
        store.insert(tenant, inventory_rule()).unwrap();

        let event = updated(tenant, 0);
        assert_eq!(dispatcher.dispatch(&event).unwrap().failed(), 1);

        let retry = dispatcher.dispatch(&event).unwrap();
        let run = retry.runs().next().unwrap();
        assert_eq!(run.attempt, 2);
        assert_eq!(run.resumed_from, None);
        assert_eq!(step_names(run), vec!["check", "notify", "alert"]);

        // Succeeded now, so further deliveries are duplicates.
        assert_eq!(dispatcher.dispatch(&event).unwrap().skipped(), 1);
    }

    #[test]
    fn resume_reenters_at_failed_action_on_the_old_snapshot() {
        let policy = RedeliveryPolicy::retry_failed(ResumeMode::Resume, 3);
        let (dispatcher, store) = dispatcher(policy, flaky_notifications(1));
        let tenant = TenantId::new();
        let doc = inventory_rule();
        store.insert(tenant, doc.clone()).unwrap();

        let event = updated(tenant, 0);
        let first = dispatcher.dispatch(&event).unwrap();
        let failed = first.runs().next().unwrap().clone();

        // Replace the rule between attempts; the resumed run keeps version 1.
        let mut changed = doc;
        changed.rule.name = "restock v2".into();
        store.replace(tenant, changed, ExpectedVersion::Exact(1)).unwrap();

        let retry = dispatcher.dispatch(&event).unwrap();
        let run = retry.runs().next().unwrap();
        assert_eq!(run.status, RunStatus::Succeeded);
        assert_eq!(run.rule_version, 1);
        assert_eq!(run.resumed_from, Some(failed.id));
        assert_eq!(step_names(run), vec!["notify", "alert"]);
        // The check output recorded by the failed run is carried over.
        assert!(run.context.output_of("check").is_some());
    }

    #[test]
    fn retry_budget_is_bounded() {
        let policy = RedeliveryPolicy::retry_failed(ResumeMode::Restart, 2);
        let (dispatcher, store) = dispatcher(policy, flaky_notifications(u32::MAX));
        let tenant = TenantId::new();
        store.insert(tenant, inventory_rule()).unwrap();

        let event = updated(tenant, 0);
        assert_eq!(dispatcher.dispatch(&event).unwrap().failed(), 1);
        assert_eq!(dispatcher.dispatch(&event).unwrap().failed(), 1);
        assert_eq!(dispatcher.dispatch(&event).unwrap().skipped(), 1);
    }

    #[test]
    fn step_limit_fails_the_run() {
        let (store, runs) = (InMemoryRuleStore::arc(), InMemoryRunLog::arc());
        let dispatcher = TriggerDispatcher::new(
            store.clone(),
            runs,
            Arc::new(ActionCatalog::builtin()),
            Arc::new(HandlerRegistry::with_builtins()),
            DispatcherConfig::new(RedeliveryPolicy::RunEveryDelivery).with_max_steps(2),
        );
        let tenant = TenantId::new();
        store.insert(tenant, inventory_rule()).unwrap();

        let report = dispatcher.dispatch(&updated(tenant, 0)).unwrap();
        let run = report.runs().next().unwrap();
        assert!(run.status.is_failed());
        assert_eq!(run.steps.len(), 2);
    }
}
