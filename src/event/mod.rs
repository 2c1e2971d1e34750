//! Event module
//!
//! Typed events and the bus that distributes them:
//! - `types`: the event taxonomy
//! - `bus`: synchronous publish/subscribe dispatcher

mod bus;
mod types;

pub use bus::{EventBus, Handler, SubscriptionId};
pub use types::{ConnectionState, EntityKind, Event, EventKind, PollDirection};
