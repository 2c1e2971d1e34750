//! Direct message polling
//!
//! Polls the received and sent lists concurrently and merges both into the
//! conversation store.

use std::sync::Arc;

use crate::data::{Conversation, ConversationStore};
use crate::error::AppError;
use crate::event::{Event, EventBus, PollDirection};
use crate::remote::RemoteService;

/// Direct message manager
pub struct DirectMessageManager {
    remote: Arc<dyn RemoteService>,
    conversations: Arc<ConversationStore>,
    bus: Arc<EventBus>,
}

impl DirectMessageManager {
    pub fn new(
        remote: Arc<dyn RemoteService>,
        conversations: Arc<ConversationStore>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            remote,
            conversations,
            bus,
        }
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.conversations
    }

    pub async fn conversations(&self) -> Vec<Conversation> {
        self.conversations.conversations().await
    }

    pub async fn conversation(&self, collocutor_id: u64) -> Option<Conversation> {
        self.conversations.conversation(collocutor_id).await
    }

    /// Poll both directions
    ///
    /// Each direction that succeeds is merged and announced with
    /// [`Event::DirectMessageFetched`] even if the other fails. The first
    /// failure (received before sent) is returned.
    pub async fn fetch(&self) -> Result<(), AppError> {
        let (received, sent) = tokio::join!(
            self.poll(PollDirection::Received),
            self.poll(PollDirection::Sent),
        );

        let (received, sent) = (received?, sent?);
        tracing::debug!(received, sent, "Direct messages polled");
        Ok(())
    }

    /// Poll one direction; returns how many messages were new
    async fn poll(&self, direction: PollDirection) -> Result<usize, AppError> {
        use crate::metrics::POLLS_TOTAL;

        let result = match direction {
            PollDirection::Received => self.remote.direct_messages_received().await,
            PollDirection::Sent => self.remote.direct_messages_sent().await,
        };

        let messages = match result {
            Ok(messages) => messages,
            Err(error) => {
                POLLS_TOTAL
                    .with_label_values(&[direction.as_str(), "error"])
                    .inc();
                tracing::warn!(direction = direction.as_str(), %error, "Direct message poll failed");
                return Err(error);
            }
        };

        let mut added = 0;
        for remote in messages {
            let collocutor_id = match direction {
                PollDirection::Received => remote.sender.id,
                PollDirection::Sent => remote.recipient.id,
            };
            let (_, inserted) = self.conversations.ingest(remote, collocutor_id).await;
            if inserted {
                added += 1;
            }
        }

        POLLS_TOTAL
            .with_label_values(&[direction.as_str(), "ok"])
            .inc();
        self.bus
            .publish_or_report(Event::DirectMessageFetched { direction });
        Ok(added)
    }
}
