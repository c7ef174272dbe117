//! Background workers.

pub mod trigger_worker;

pub use trigger_worker::{TriggerWorker, TriggerWorkerConfig, TriggerWorkerHandle, TriggerWorkerStats};
