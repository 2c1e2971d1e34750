//! Timeline feeds
//!
//! Holds the home and mentions feeds as status id lists and resolves them
//! through the status cache on demand.

use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};

use crate::data::{AccountCache, Status, StatusCache};
use crate::error::AppError;
use crate::event::{Event, EventBus, EventKind, SubscriptionId};
use crate::remote::RemoteService;

/// Feeds keep at most this many ids; the oldest are dropped first
const MAX_FEED_ITEMS: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    Home,
    Mentions,
}

#[derive(Default)]
struct Feeds {
    /// Oldest first
    home: VecDeque<u64>,
    /// Oldest first
    mentions: VecDeque<u64>,
}

impl Feeds {
    fn get(&self, feed: Feed) -> &VecDeque<u64> {
        match feed {
            Feed::Home => &self.home,
            Feed::Mentions => &self.mentions,
        }
    }

    fn get_mut(&mut self, feed: Feed) -> &mut VecDeque<u64> {
        match feed {
            Feed::Home => &mut self.home,
            Feed::Mentions => &mut self.mentions,
        }
    }

    fn push(&mut self, feed: Feed, id: u64) {
        let ids = self.get_mut(feed);
        if ids.contains(&id) {
            return;
        }
        ids.push_back(id);
        while ids.len() > MAX_FEED_ITEMS {
            ids.pop_front();
        }
    }

    fn remove(&mut self, id: u64) {
        self.home.retain(|s| *s != id);
        self.mentions.retain(|s| *s != id);
    }
}

/// Timeline service
pub struct Timeline {
    statuses: Arc<StatusCache>,
    accounts: Arc<AccountCache>,
    feeds: RwLock<Feeds>,
}

impl Timeline {
    pub fn new(statuses: Arc<StatusCache>, accounts: Arc<AccountCache>) -> Self {
        Self {
            statuses,
            accounts,
            feeds: RwLock::new(Feeds::default()),
        }
    }

    /// Follow status events on `bus`
    pub fn attach(self: &Arc<Self>, bus: &EventBus) -> SubscriptionId {
        let timeline = self.clone();
        bus.subscribe(EventKind::Status, move |event| {
            timeline.handle(event);
            Ok(())
        })
    }

    fn handle(&self, event: &Event) {
        let mut feeds = self.feeds.write().unwrap_or_else(PoisonError::into_inner);
        match event {
            Event::StatusReceived { status, .. } => feeds.push(Feed::Home, status.id),
            Event::Mention { status, .. } => feeds.push(Feed::Mentions, status.id),
            Event::StatusDeleted { status_id } => feeds.remove(*status_id),
            _ => {}
        }
    }

    /// Status ids of `feed`, newest first
    pub fn ids(&self, feed: Feed) -> Vec<u64> {
        let feeds = self.feeds.read().unwrap_or_else(PoisonError::into_inner);
        feeds.get(feed).iter().rev().copied().collect()
    }

    /// Every id held by any feed
    pub fn feed_ids(&self) -> Vec<u64> {
        let feeds = self.feeds.read().unwrap_or_else(PoisonError::into_inner);
        feeds.home.iter().chain(feeds.mentions.iter()).copied().collect()
    }

    /// Resolve `feed` through the status cache, newest first
    ///
    /// Ids whose status is no longer cached are skipped.
    pub async fn statuses(&self, feed: Feed) -> Vec<Arc<Status>> {
        let mut resolved = Vec::new();
        for id in self.ids(feed) {
            if let Some(status) = self.statuses.find(id).await {
                resolved.push(status);
            }
        }
        resolved
    }

    /// Seed the mentions feed from the remote
    ///
    /// The remote lists newest first; statuses are ingested oldest first so
    /// the feed order matches arrival order. Returns the number fetched.
    pub async fn fetch_mentions(&self, remote: &dyn RemoteService) -> Result<usize, AppError> {
        let mentions = remote.mentions().await?;
        let count = mentions.len();

        for remote in mentions.into_iter().rev() {
            let (status, _) = self.statuses.ingest(remote, &self.accounts).await;
            self.feeds
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .push(Feed::Mentions, status.id);
        }

        tracing::info!(count, "Mentions fetched");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{cached_account, cached_status, remote_status};
    use crate::data::{CachePolicy, EntityCache};
    use crate::remote::MockRemoteService;

    fn timeline() -> (Arc<Timeline>, Arc<EventBus>) {
        let accounts = Arc::new(EntityCache::new("account", CachePolicy::unthrottled()));
        let statuses = Arc::new(EntityCache::new("status", CachePolicy::unthrottled()));
        let timeline = Arc::new(Timeline::new(statuses, accounts));
        let bus = Arc::new(EventBus::new());
        timeline.attach(&bus);
        (timeline, bus)
    }

    async fn received(id: u64) -> Event {
        Event::StatusReceived {
            status: cached_status(id, 2, "hi").await,
            author: cached_account(2).await,
        }
    }

    #[tokio::test]
    async fn events_maintain_feeds() {
        let (timeline, bus) = timeline();

        bus.publish(received(1).await).unwrap();
        bus.publish(received(2).await).unwrap();
        bus.publish(received(2).await).unwrap();
        bus.publish(received(3).await).unwrap();
        bus.publish(Event::StatusDeleted { status_id: 2 }).unwrap();

        assert_eq!(timeline.ids(Feed::Home), vec![3, 1]);
        assert!(timeline.ids(Feed::Mentions).is_empty());
    }

    #[tokio::test]
    async fn feed_length_is_capped() {
        let (timeline, bus) = timeline();
        for id in 0..(MAX_FEED_ITEMS as u64 + 5) {
            bus.publish(received(id).await).unwrap();
        }

        let ids = timeline.ids(Feed::Home);
        assert_eq!(ids.len(), MAX_FEED_ITEMS);
        assert_eq!(*ids.last().unwrap(), 5);
    }

    #[tokio::test]
    async fn fetch_mentions_seeds_oldest_first() {
        let (timeline, _bus) = timeline();
        let mut remote = MockRemoteService::new();
        remote.expect_mentions().returning(|| {
            Ok(vec![
                remote_status(30, 4, "@alice newest"),
                remote_status(20, 4, "@alice middle"),
                remote_status(10, 5, "@alice oldest"),
            ])
        });

        let count = timeline.fetch_mentions(&remote).await.unwrap();

        assert_eq!(count, 3);
        assert_eq!(timeline.ids(Feed::Mentions), vec![30, 20, 10]);
        let texts: Vec<_> = timeline
            .statuses(Feed::Mentions)
            .await
            .iter()
            .map(|s| s.text.clone())
            .collect();
        assert_eq!(texts, vec!["@alice newest", "@alice middle", "@alice oldest"]);
    }

    #[tokio::test]
    async fn unresolvable_ids_are_skipped() {
        let (timeline, bus) = timeline();
        bus.publish(received(7).await).unwrap();

        assert_eq!(timeline.ids(Feed::Home), vec![7]);
        assert!(timeline.statuses(Feed::Home).await.is_empty());
    }

    #[tokio::test]
    async fn feed_ids_cover_both_feeds() {
        let (timeline, bus) = timeline();
        bus.publish(received(1).await).unwrap();
        bus.publish(Event::Mention {
            status: cached_status(2, 3, "@alice hi").await,
            author: cached_account(3).await,
        })
        .unwrap();

        let mut ids = timeline.feed_ids();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);
    }
}
