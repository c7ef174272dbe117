//! Entity lifecycle events and the pub/sub plumbing that carries them.
//!
//! CRUD domain packages publish an [`EntityChanged`] event (wrapped in an
//! [`EventEnvelope`]) whenever an entity is created, updated or deleted. The
//! automation engine subscribes to the bus and matches these events against
//! active rules.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod lifecycle;
pub mod tenant;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use lifecycle::{EntityChanged, LifecycleKind};
pub use tenant::TenantScoped;
