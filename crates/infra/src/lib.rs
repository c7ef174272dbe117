//! Infrastructure layer: rule storage, run log, trigger dispatch, workers,
//! configuration.

pub mod config;
pub mod rule_service;
pub mod rule_store;
pub mod run_log;
pub mod trigger;
pub mod workers;


pub use config::{AppConfig, ConfigError};
pub use rule_service::{RuleService, ServiceError};
pub use rule_store::{InMemoryRuleStore, RuleStore, StoreError, StoredRule};
pub use run_log::{InMemoryRunLog, RunLog, RunLogError};
pub use trigger::{DispatchReport, DispatcherConfig, RedeliveryPolicy, ResumeMode, TriggerDispatcher};
pub use workers::{TriggerWorker, TriggerWorkerConfig, TriggerWorkerHandle, TriggerWorkerStats};
