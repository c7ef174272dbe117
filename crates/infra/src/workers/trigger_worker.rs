use std::io;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info};

use opsforge_core::TenantId;
use opsforge_events::{EntityChanged, EventBus, EventEnvelope, Subscription, TenantScoped};

use crate::rule_store::RuleStore;
use crate::run_log::RunLog;
use crate::trigger::{DispatchReport, TriggerDispatcher};

/// Trigger worker configuration.
#[derive(Debug, Clone)]
pub struct TriggerWorkerConfig {
    /// Thread name, also used in logs
    pub name: String,
    /// How long to block on the subscription before re-checking shutdown
    pub tick: Duration,
    /// When set, events of other tenants are ignored
    pub tenant_id: Option<TenantId>,
}

impl Default for TriggerWorkerConfig {
    fn default() -> Self {
        Self {
            name: "trigger-worker".to_string(),
            tick: Duration::from_millis(250),
            tenant_id: None,
        }
    }
}

impl TriggerWorkerConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }
}

/// Worker runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TriggerWorkerStats {
    pub events_seen: u64,
    pub events_ignored: u64,
    pub runs_started: u64,
    pub runs_succeeded: u64,
    pub runs_failed: u64,
    pub deliveries_skipped: u64,
    pub dispatch_errors: u64,
    pub uptime_secs: u64,
}

impl TriggerWorkerStats {
    fn record(&mut self, report: &DispatchReport) {
        let succeeded = report.succeeded() as u64;
        let failed = report.failed() as u64;
        self.runs_started += succeeded + failed;
        self.runs_succeeded += succeeded;
        self.runs_failed += failed;
        self.deliveries_skipped += report.skipped() as u64;
        self.dispatch_errors += report.errored() as u64;
    }
}

/// Handle to control and join the trigger worker.
#[derive(Debug)]
pub struct TriggerWorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<TriggerWorkerStats>>,
}

impl TriggerWorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }

    pub fn stats(&self) -> TriggerWorkerStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

/// Subscribes to lifecycle events and hands each one to a
/// [`TriggerDispatcher`].
///
/// - Delivery is at-least-once; duplicates are resolved by the dispatcher's
///   redelivery policy
/// - A failed dispatch is logged and counted, the loop keeps going
/// - Supports graceful shutdown
#[derive(Debug)]
pub struct TriggerWorker;

impl TriggerWorker {
    /// Spawn the worker thread. The subscription is taken before the thread
    /// starts, so no event published after `spawn` returns is missed.
    pub fn spawn<S, L, B>(
        dispatcher: Arc<TriggerDispatcher<S, L>>,
        bus: &B,
        config: TriggerWorkerConfig,
    ) -> io::Result<TriggerWorkerHandle>
    where
        S: RuleStore + 'static,
        L: RunLog + 'static,
        B: EventBus<EventEnvelope<EntityChanged>> + ?Sized,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let sub = bus.subscribe();
        let stats = Arc::new(Mutex::new(TriggerWorkerStats::default()));
        let worker_stats = stats.clone();

        let join = thread::Builder::new()
            .name(config.name.clone())
            .spawn(move || worker_loop(dispatcher.as_ref(), sub, shutdown_rx, &config, &worker_stats))?;

        Ok(TriggerWorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
            stats,
        })
    }
}

fn worker_loop<S, L>(
    dispatcher: &TriggerDispatcher<S, L>,
    sub: Subscription<EventEnvelope<EntityChanged>>,
    shutdown_rx: mpsc::Receiver<()>,
    config: &TriggerWorkerConfig,
    stats: &Mutex<TriggerWorkerStats>,
) where
    S: RuleStore,
    L: RunLog,
{
    info!(worker = %config.name, policy = %dispatcher.config().policy, "trigger worker started");
    let started = Instant::now();

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        let envelope = match sub.recv_timeout(config.tick) {
            Ok(envelope) => envelope,
            Err(RecvTimeoutError::Timeout) => {
                update(stats, |s| s.uptime_secs = started.elapsed().as_secs());
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        };

        if !accepts(config.tenant_id, &envelope) {
            update(stats, |s| {
                s.events_seen += 1;
                s.events_ignored += 1;
            });
            continue;
        }

        match dispatcher.dispatch(&envelope) {
            Ok(report) => {
                debug!(
                    worker = %config.name,
                    event_id = %report.event_id,
                    rules = report.outcomes.len(),
                    "event dispatched"
                );
                update(stats, |s| {
                    s.record(&report);
                    s.events_seen += 1;
                });
            }
            Err(err) => {
                error!(worker = %config.name, event_id = %envelope.event_id(), error = %err, "dispatch failed");
                update(stats, |s| {
                    s.dispatch_errors += 1;
                    s.events_seen += 1;
                });
            }
        }
        update(stats, |s| s.uptime_secs = started.elapsed().as_secs());
    }

    info!(worker = %config.name, "trigger worker stopped");
}

/// A worker pinned to a tenant only takes that tenant's messages.
fn accepts<M: TenantScoped>(pinned: Option<TenantId>, message: &M) -> bool {
    pinned.is_none_or(|tenant| message.tenant_id() == tenant)
}

fn update(stats: &Mutex<TriggerWorkerStats>, f: impl FnOnce(&mut TriggerWorkerStats)) {
    if let Ok(mut s) = stats.lock() {
        f(&mut s);
    }
}
