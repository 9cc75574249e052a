//! Change events and their fan-out mechanics.
//!
//! Domain crates define the payloads (`Event` implementors); this crate only
//! knows how to wrap them (`EventEnvelope`) and distribute them (`EventBus`).

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
