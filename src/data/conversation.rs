//! Direct message conversations
//!
//! Messages are grouped by collocutor. Within a conversation each message id
//! appears once and the sequence is kept sorted newest first.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::cache::AccountCache;
use super::models::{Account, DirectMessage, format_timestamp};
use crate::remote::RemoteDirectMessage;

/// Messages exchanged with one collocutor
#[derive(Debug, Clone)]
pub struct Conversation {
    pub collocutor_id: u64,
    /// Newest first
    messages: Vec<Arc<DirectMessage>>,
}

impl Conversation {
    fn new(collocutor_id: u64) -> Self {
        Self {
            collocutor_id,
            messages: Vec::new(),
        }
    }

    /// Messages, newest first
    pub fn messages(&self) -> &[Arc<DirectMessage>] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Insert unless a message with the same id is already present
    fn merge(&mut self, message: Arc<DirectMessage>) -> bool {
        if self.messages.iter().any(|m| m.id == message.id) {
            return false;
        }
        self.messages.push(message);
        self.messages
            .sort_by(|a, b| b.created_at.cmp(&a.created_at));
        true
    }

    /// Text of the most recent message on one line
    pub fn preview(&self) -> String {
        self.messages
            .iter()
            .max_by_key(|m| m.created_at)
            .map(|m| m.text.replace('\n', " "))
            .unwrap_or_default()
    }

    /// Creation time of the most recent message
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.messages.iter().map(|m| m.created_at).max()
    }

    /// [`last_activity`](Self::last_activity) formatted for display
    pub fn updated_at(&self, now: DateTime<Utc>) -> Option<String> {
        self.last_activity().map(|ts| format_timestamp(ts, now))
    }
}

/// All conversations, keyed by collocutor id
pub struct ConversationStore {
    conversations: RwLock<HashMap<u64, Conversation>>,
    accounts: Arc<AccountCache>,
}

impl ConversationStore {
    pub fn new(accounts: Arc<AccountCache>) -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            accounts,
        }
    }

    /// Merge a message into the collocutor's conversation
    ///
    /// Returns false if a message with that id was already recorded; the
    /// recorded copy is kept as is.
    pub async fn record(&self, collocutor_id: u64, message: Arc<DirectMessage>) -> bool {
        let mut conversations = self.conversations.write().await;
        conversations
            .entry(collocutor_id)
            .or_insert_with(|| Conversation::new(collocutor_id))
            .merge(message)
    }

    /// Cache both participants, then record the message
    pub async fn ingest(&self, remote: RemoteDirectMessage, collocutor_id: u64) -> (Arc<DirectMessage>, bool) {
        let message = Arc::new(DirectMessage::from_remote(&remote));
        self.accounts.upsert(remote.sender).await;
        self.accounts.upsert(remote.recipient).await;

        let inserted = self.record(collocutor_id, message.clone()).await;
        (message, inserted)
    }

    /// Snapshot of every conversation, in no particular order
    pub async fn conversations(&self) -> Vec<Conversation> {
        self.conversations.read().await.values().cloned().collect()
    }

    pub async fn conversation(&self, collocutor_id: u64) -> Option<Conversation> {
        self.conversations.read().await.get(&collocutor_id).cloned()
    }

    /// Resolve the collocutor through the account cache
    pub async fn collocutor(&self, conversation: &Conversation) -> Option<Arc<Account>> {
        self.accounts.find(conversation.collocutor_id).await
    }

    /// Resolve `(sender, recipient)` through the account cache
    pub async fn participants(
        &self,
        message: &DirectMessage,
    ) -> (Option<Arc<Account>>, Option<Arc<Account>>) {
        (
            self.accounts.find(message.sender_id).await,
            self.accounts.find(message.recipient_id).await,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::cache::{CachePolicy, EntityCache};
    use crate::data::fixtures::remote_direct_message;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(secs)
    }

    fn message(id: &str, text: &str, created_at: DateTime<Utc>) -> Arc<DirectMessage> {
        Arc::new(DirectMessage::from_remote(&remote_direct_message(
            id, 5, 1, text, created_at,
        )))
    }

    fn store() -> ConversationStore {
        ConversationStore::new(Arc::new(EntityCache::new("account", CachePolicy::unthrottled())))
    }

    #[tokio::test]
    async fn duplicate_ids_are_recorded_once() {
        let store = store();

        assert!(store.record(5, message("m1", "first", t(0))).await);
        assert!(!store.record(5, message("m1", "second", t(10))).await);

        let conversation = store.conversation(5).await.unwrap();
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.messages()[0].text, "first");
    }

    #[tokio::test]
    async fn messages_stay_sorted_newest_first() {
        let store = store();

        for (id, secs) in [("a", 20), ("b", 5), ("c", 40), ("d", 10), ("b", 99)] {
            store.record(5, message(id, id, t(secs))).await;

            let conversation = store.conversation(5).await.unwrap();
            let times: Vec<_> = conversation.messages().iter().map(|m| m.created_at).collect();
            let mut sorted = times.clone();
            sorted.sort_by(|a, b| b.cmp(a));
            assert_eq!(times, sorted);
        }

        let ids: Vec<_> = store
            .conversation(5)
            .await
            .unwrap()
            .messages()
            .iter()
            .map(|m| m.id.clone())
            .collect();
        assert_eq!(ids, vec!["c", "a", "d", "b"]);
    }

    #[tokio::test]
    async fn preview_collapses_newlines_of_latest_message() {
        let store = store();
        store.record(5, message("old", "older", t(0))).await;
        store.record(5, message("new", "line one\nline two", t(60))).await;

        let conversation = store.conversation(5).await.unwrap();

        assert_eq!(conversation.preview(), "line one line two");
        assert_eq!(conversation.last_activity(), Some(t(60)));
        assert_eq!(conversation.updated_at(t(120)).as_deref(), Some("00:01:00"));
    }

    #[tokio::test]
    async fn conversations_are_keyed_by_collocutor() {
        let store = store();
        store.record(5, message("m1", "to five", t(0))).await;
        store.record(6, message("m2", "to six", t(0))).await;

        let mut collocutors: Vec<_> = store
            .conversations()
            .await
            .iter()
            .map(|c| c.collocutor_id)
            .collect();
        collocutors.sort();

        assert_eq!(collocutors, vec![5, 6]);
    }

    #[tokio::test]
    async fn ingest_caches_participants() {
        let store = store();

        let (message, inserted) = store
            .ingest(remote_direct_message("m1", 5, 1, "hi", t(0)), 5)
            .await;

        assert!(inserted);
        let (sender, recipient) = store.participants(&message).await;
        assert_eq!(sender.unwrap().id, 5);
        assert_eq!(recipient.unwrap().id, 1);

        let conversation = store.conversation(5).await.unwrap();
        assert_eq!(store.collocutor(&conversation).await.unwrap().id, 5);
    }
}
