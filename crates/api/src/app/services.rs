use std::io;
use std::sync::Arc;

use opsforge_automation::{ActionCatalog, HandlerRegistry};
use opsforge_events::{EntityChanged, EventEnvelope, InMemoryEventBus};
use opsforge_infra::{
    DispatcherConfig, InMemoryRuleStore, InMemoryRunLog, RuleService, TriggerDispatcher, TriggerWorker,
    TriggerWorkerConfig, TriggerWorkerHandle,
};

pub type LifecycleBus = InMemoryEventBus<EventEnvelope<EntityChanged>>;

/// Everything the HTTP handlers need, shared behind an `Arc`.
pub struct AppServices {
    pub rules: RuleService<Arc<InMemoryRuleStore>>,
    pub runs: Arc<InMemoryRunLog>,
    pub catalog: Arc<ActionCatalog>,
    pub bus: Arc<LifecycleBus>,
    pub dispatcher: DispatcherConfig,
}

/// Wire the in-memory stores, the dispatcher and the trigger worker.
///
/// The returned handle owns the worker thread; keep it alive for as long as
/// events should be processed.
pub fn build_services(config: DispatcherConfig) -> io::Result<(Arc<AppServices>, TriggerWorkerHandle)> {
    let catalog = Arc::new(ActionCatalog::builtin());
    let handlers = Arc::new(HandlerRegistry::with_builtins());
    let store = InMemoryRuleStore::arc();
    let runs = InMemoryRunLog::arc();
    let bus = Arc::new(LifecycleBus::new());

    let dispatcher = Arc::new(TriggerDispatcher::new(
        store.clone(),
        runs.clone(),
        catalog.clone(),
        handlers,
        config,
    ));
    let worker = TriggerWorker::spawn(dispatcher, &bus, TriggerWorkerConfig::default())?;

    let services = AppServices {
        rules: RuleService::new(store, catalog.clone()),
        runs,
        catalog,
        bus,
        dispatcher: config,
    };
    Ok((Arc::new(services), worker))
}
