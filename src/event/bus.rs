//! Event bus
//!
//! Typed publish/subscribe dispatcher. Producers and consumers only share
//! the bus; neither knows about the other.
//!
//! Delivery is synchronous: `publish` calls every matching handler on the
//! caller's task, in registration order, and returns once all of them have
//! returned. Handlers that need to do async work spawn it themselves.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use super::types::{Event, EventKind};
use crate::error::AppError;

/// Subscriber callback
pub type Handler = Arc<dyn Fn(&Event) -> Result<(), AppError> + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    kind: EventKind,
    handler: Handler,
}

/// Publish/subscribe dispatcher keyed by [`EventKind`]
#[derive(Default)]
pub struct EventBus {
    subscriptions: RwLock<Vec<Subscription>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events of `kind` and all its descendants
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) -> Result<(), AppError> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscription {
                id,
                kind,
                handler: Arc::new(handler),
            });

        tracing::debug!(%kind, subscription = id.0, "Subscribed");
        id
    }

    /// Remove a subscription; returns false if it was already gone
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        before != subscriptions.len()
    }

    /// Deliver `event` to every matching handler
    ///
    /// All matching handlers run even if one fails; the first failure is
    /// returned to the caller, which decides how to report it.
    pub fn publish(&self, event: Event) -> Result<(), AppError> {
        let kind = event.kind();

        // Snapshot so handlers may subscribe or publish without deadlocking.
        let handlers: Vec<Handler> = self
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| kind.is_a(s.kind))
            .map(|s| s.handler.clone())
            .collect();

        use crate::metrics::EVENTS_PUBLISHED_TOTAL;
        EVENTS_PUBLISHED_TOTAL
            .with_label_values(&[kind.as_str()])
            .inc();

        let mut first_error = None;
        for handler in handlers {
            if let Err(error) = handler(&event) {
                tracing::debug!(%kind, %error, "Event handler failed");
                first_error.get_or_insert(error);
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Publish, turning a handler failure into an error event
    ///
    /// The error event itself is published once; a failure while delivering
    /// it is only logged.
    pub fn publish_or_report(&self, event: Event) {
        if let Err(error) = self.publish(event) {
            tracing::warn!(%error, "Event handler returned an error");
            if let Err(error) = self.publish(Event::Error(error.to_string())) {
                tracing::error!(%error, "Failed to deliver error event");
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
