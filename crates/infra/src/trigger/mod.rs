//! Trigger dispatch and redelivery handling.

pub mod dispatcher;
pub mod policy;

pub use dispatcher::{DispatchError, DispatchReport, DispatcherConfig, RuleDispatch, TriggerDispatcher};
pub use policy::{DeliveryDecision, ParsePolicyError, RedeliveryPolicy, ResumeMode, SkipReason};
