//! Service layer
//!
//! Producers (streaming session, periodic fetches) and the bundled
//! consumers (notifier, timeline). They share state only through the data
//! layer and the event bus.

mod direct_messages;
mod fetcher;
mod notifier;
mod streaming;
mod timeline;
mod watchdog;

pub use direct_messages::DirectMessageManager;
pub use fetcher::PeriodicFetcher;
pub use notifier::{Notification, NotificationLevel, Notifier};
pub use streaming::{StreamingContext, StreamingSession};
pub use timeline::{Feed, Timeline};
pub use watchdog::Watchdog;
