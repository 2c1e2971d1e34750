//! Desktop-style notifications
//!
//! Turns favorites, mentions and user-facing messages into
//! [`Notification`]s and queues them on a channel. The consumer decides how
//! to show them.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

use crate::error::AppError;
use crate::event::{Event, EventBus, EventKind, SubscriptionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub time: DateTime<Utc>,
    pub level: NotificationLevel,
    pub message: String,
}

pub struct Notifier {
    sender: mpsc::UnboundedSender<Notification>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Notification>>>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
        }
    }

    /// Hand out the queue; only the first caller gets it
    pub fn take_receiver(&self) -> Option<mpsc::UnboundedReceiver<Notification>> {
        self.receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Subscribe to the events that produce notifications
    pub fn attach(self: &Arc<Self>, bus: &EventBus) -> Vec<SubscriptionId> {
        [EventKind::Favorite, EventKind::Mention, EventKind::Message]
            .into_iter()
            .map(|kind| {
                let notifier = self.clone();
                bus.subscribe(kind, move |event| notifier.handle(event))
            })
            .collect()
    }

    fn handle(&self, event: &Event) -> Result<(), AppError> {
        match event {
            Event::Favorite {
                source,
                target,
                authenticating_user_id,
            } => {
                if source.id == *authenticating_user_id {
                    return Ok(());
                }
                self.show(
                    NotificationLevel::Info,
                    format!(
                        "@{} has favorited your tweet: {}",
                        source.screen_name, target.text
                    ),
                )
            }
            Event::Mention { status, author } => self.show(
                NotificationLevel::Info,
                format!("Mentioned by @{}: {}", author.screen_name, status.text),
            ),
            Event::Info(message) => self.show(NotificationLevel::Info, message.clone()),
            Event::Warning(message) => self.show(NotificationLevel::Warning, message.clone()),
            Event::Error(message) => self.show(NotificationLevel::Error, message.clone()),
            _ => Ok(()),
        }
    }

    fn show(&self, level: NotificationLevel, message: String) -> Result<(), AppError> {
        let notification = Notification {
            time: Utc::now(),
            level,
            message: message.replace('\n', " "),
        };

        if self.sender.send(notification).is_err() {
            tracing::debug!("Notification queue closed");
        }
        Ok(())
    }
}
