//! In-memory entity caches
//!
//! Identity-mapped stores: at most one cached instance per id, created on
//! first observation and merged on every later one. These caches are
//! volatile and cleared on restart.
//!
//! The slot held by the cache is the canonical instance. Readers get an
//! `Arc` snapshot; a merge replaces the slot's contents copy-on-write, so
//! a snapshot never observes a half-applied update.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::models::{Account, Status};
use crate::error::AppError;
use crate::event::{EntityKind, Event, EventBus};
use crate::remote::{RemoteAccount, RemoteList, RemoteService, RemoteStatus};

// =============================================================================
// Entity contract
// =============================================================================

pub(crate) mod sealed {
    use chrono::{DateTime, Utc};

    /// Construction and merge from remote payloads; not nameable outside
    /// the crate
    pub trait Materialize: Sized {
        /// Remote representation the entity is built from
        type Remote: Send + Sync + 'static;

        fn remote_id(remote: &Self::Remote) -> u64;

        fn from_remote(remote: &Self::Remote, now: DateTime<Utc>) -> Self;

        /// Merge a fresher remote representation into `self`
        fn apply(&mut self, remote: &Self::Remote, now: DateTime<Utc>);

        fn touch(&mut self, now: DateTime<Utc>);
    }
}

/// An entity that can live in an [`EntityCache`]
///
/// Entities are only obtained through [`EntityCache::upsert`]:
///
/// ```compile_fail
/// use chirpstream::data::{Account, CacheEntity};
/// use chirpstream::remote::RemoteAccount;
///
/// fn build(remote: &RemoteAccount) -> Account {
///     Account::from_remote(remote, chrono::Utc::now())
/// }
/// ```
pub trait CacheEntity: sealed::Materialize + Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> u64;

    fn touched_at(&self) -> DateTime<Utc>;

    fn updated_at(&self) -> DateTime<Utc>;
}

/// Remote accessor used by [`EntityCache::find_or_fetch`]
#[async_trait]
pub trait EntityFetcher<T: CacheEntity>: Send + Sync {
    async fn fetch(&self, id: u64) -> Result<T::Remote, AppError>;
}

/// Adapts a [`RemoteService`] into the fetchers the caches need
#[derive(Clone)]
pub struct RemoteFetcher(pub Arc<dyn RemoteService>);

#[async_trait]
impl EntityFetcher<Account> for RemoteFetcher {
    async fn fetch(&self, id: u64) -> Result<RemoteAccount, AppError> {
        self.0.fetch_account(id).await
    }
}

#[async_trait]
impl EntityFetcher<super::models::List> for RemoteFetcher {
    async fn fetch(&self, id: u64) -> Result<RemoteList, AppError> {
        self.0.fetch_list(id).await
    }
}

/// Called with each remote payload that was actually applied
pub type ApplyHook<T> = Arc<dyn Fn(&<T as sealed::Materialize>::Remote) + Send + Sync>;

// =============================================================================
// Policy
// =============================================================================

/// Freshness rules of a cache
#[derive(Debug, Clone, Copy, Default)]
pub struct CachePolicy {
    /// Updates arriving sooner than this after the last applied one are dropped
    pub update_throttle: Option<Duration>,
    /// Entries not touched for this long are removed by a sweep
    pub max_idle: Option<Duration>,
}

impl CachePolicy {
    /// Every update applied, nothing evicted
    pub fn unthrottled() -> Self {
        Self::default()
    }

    fn is_throttled(&self, updated_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self.update_throttle.and_then(|d| chrono::Duration::from_std(d).ok()) {
            Some(window) => updated_at + window > now,
            None => false,
        }
    }

    fn is_idle(&self, touched_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self.max_idle.and_then(|d| chrono::Duration::from_std(d).ok()) {
            Some(max_idle) => touched_at <= now - max_idle,
            None => false,
        }
    }
}

/// What an upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    /// Dropped by the throttle; the existing instance is unchanged
    Throttled,
}

// =============================================================================
// Entity Cache
// =============================================================================

/// Identity-mapped, optionally throttled and TTL-swept store
///
/// Every operation takes the cache's single lock, so concurrent upserts for
/// the same id are applied one after the other and the throttle decides
/// which of them win.
pub struct EntityCache<T: CacheEntity> {
    /// Name used in logs and metrics
    name: &'static str,
    /// Id -> canonical instance
    entries: RwLock<HashMap<u64, Arc<T>>>,
    policy: CachePolicy,
    fetcher: Option<Arc<dyn EntityFetcher<T>>>,
    on_apply: Option<ApplyHook<T>>,
    bus: Option<Arc<EventBus>>,
}

impl<T: CacheEntity> EntityCache<T> {
    /// Create new cache
    ///
    /// # Arguments
    /// * `name` - Label for logs and metrics
    /// * `policy` - Throttle and eviction rules
    pub fn new(name: &'static str, policy: CachePolicy) -> Self {
        Self {
            name,
            entries: RwLock::new(HashMap::new()),
            policy,
            fetcher: None,
            on_apply: None,
            bus: None,
        }
    }

    /// Remote accessor for [`find_or_fetch`](Self::find_or_fetch)
    pub fn with_fetcher(mut self, fetcher: Arc<dyn EntityFetcher<T>>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Hook run under the cache lock after each create or applied update
    pub fn with_apply_hook(mut self, hook: ApplyHook<T>) -> Self {
        self.on_apply = Some(hook);
        self
    }

    /// Publish [`Event::EntityChanged`] after each create or applied update
    pub fn with_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Create or merge, returning the canonical instance
    pub async fn upsert(&self, remote: T::Remote) -> Arc<T> {
        self.upsert_at(remote, Utc::now()).await.0
    }

    /// [`upsert`](Self::upsert) against an explicit clock
    pub async fn upsert_at(&self, remote: T::Remote, now: DateTime<Utc>) -> (Arc<T>, UpsertOutcome) {
        let id = T::remote_id(&remote);

        let (entity, outcome, size) = {
            let mut entries = self.entries.write().await;

            let (entity, outcome) = match entries.get_mut(&id) {
                Some(slot) => {
                    if self.policy.is_throttled(slot.updated_at(), now) {
                        (slot.clone(), UpsertOutcome::Throttled)
                    } else {
                        Arc::make_mut(slot).apply(&remote, now);
                        (slot.clone(), UpsertOutcome::Updated)
                    }
                }
                None => {
                    let entity = Arc::new(T::from_remote(&remote, now));
                    entries.insert(id, entity.clone());
                    (entity, UpsertOutcome::Created)
                }
            };

            if outcome != UpsertOutcome::Throttled {
                if let Some(hook) = &self.on_apply {
                    hook(&remote);
                }
            }

            (entity, outcome, entries.len())
        };

        if outcome == UpsertOutcome::Throttled {
            tracing::trace!(cache = self.name, id, "Update throttled");
        } else {
            self.record_size(size);
            if let Some(bus) = &self.bus {
                bus.publish_or_report(Event::EntityChanged { kind: T::KIND, id });
            }
        }

        (entity, outcome)
    }

    /// Get cached instance by id
    pub async fn find(&self, id: u64) -> Option<Arc<T>> {
        let result = self.entries.read().await.get(&id).cloned();

        use crate::metrics::{CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL};
        if result.is_some() {
            CACHE_HITS_TOTAL.with_label_values(&[self.name]).inc();
        } else {
            CACHE_MISSES_TOTAL.with_label_values(&[self.name]).inc();
        }

        result
    }

    /// Cached instance, or fetch it through the remote accessor
    ///
    /// # Errors
    /// `NotFound` if the instance is not cached and the fetch fails (or no
    /// accessor is configured)
    pub async fn find_or_fetch(&self, id: u64) -> Result<Arc<T>, AppError> {
        if let Some(entity) = self.find(id).await {
            return Ok(entity);
        }

        let Some(fetcher) = &self.fetcher else {
            return Err(AppError::NotFound);
        };

        match fetcher.fetch(id).await {
            Ok(remote) => Ok(self.upsert(remote).await),
            Err(error) => {
                tracing::debug!(cache = self.name, id, %error, "Remote lookup failed");
                Err(AppError::NotFound)
            }
        }
    }

    /// All cached instances, in no particular order
    pub async fn all(&self) -> Vec<Arc<T>> {
        self.entries.read().await.values().cloned().collect()
    }

    pub async fn ids(&self) -> Vec<u64> {
        self.entries.read().await.keys().copied().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Mark an instance as recently referenced; no-op for unknown ids
    pub async fn touch(&self, id: u64) {
        self.touch_at(id, Utc::now()).await;
    }

    pub async fn touch_at(&self, id: u64, now: DateTime<Utc>) {
        if let Some(slot) = self.entries.write().await.get_mut(&id) {
            Arc::make_mut(slot).touch(now);
        }
    }

    /// Touch every id in `referenced`, then evict idle entries
    ///
    /// Returns the number of evicted entries. Without a `max_idle` policy
    /// nothing is evicted.
    pub async fn sweep_at<I>(&self, referenced: I, now: DateTime<Utc>) -> usize
    where
        I: IntoIterator<Item = u64>,
    {
        let (removed, size) = {
            let mut entries = self.entries.write().await;

            for id in referenced {
                if let Some(slot) = entries.get_mut(&id) {
                    Arc::make_mut(slot).touch(now);
                }
            }

            let before = entries.len();
            entries.retain(|_, entity| !self.policy.is_idle(entity.touched_at(), now));
            (before - entries.len(), entries.len())
        };

        if removed > 0 {
            use crate::metrics::CACHE_EVICTIONS_TOTAL;
            CACHE_EVICTIONS_TOTAL
                .with_label_values(&[self.name])
                .inc_by(removed as u64);
            tracing::info!(cache = self.name, removed, remaining = size, "Evicted idle entries");
        }
        self.record_size(size);

        removed
    }

    fn record_size(&self, size: usize) {
        use crate::metrics::CACHE_SIZE;
        CACHE_SIZE
            .with_label_values(&[self.name])
            .set(size as i64);
    }
}

// =============================================================================
// Concrete caches
// =============================================================================

/// Accounts: throttled updates, idle eviction
pub type AccountCache = EntityCache<Account>;

/// Lists: every update applied, never evicted
pub type ListCache = EntityCache<super::models::List>;

/// Statuses: every update applied, idle entries outside the feeds evicted
pub type StatusCache = EntityCache<Status>;

impl EntityCache<Account> {
    /// Touch every account referenced by a cached status, then evict the
    /// accounts idle for longer than the policy allows
    pub async fn cleanup(&self, statuses: &StatusCache) -> usize {
        self.cleanup_at(statuses, Utc::now()).await
    }

    pub async fn cleanup_at(&self, statuses: &StatusCache, now: DateTime<Utc>) -> usize {
        let referenced: Vec<u64> = statuses.all().await.iter().map(|s| s.user_id).collect();
        self.sweep_at(referenced, now).await
    }
}

impl EntityCache<Status> {
    /// Evict statuses idle for longer than the policy allows, except the
    /// ids in `pinned`
    pub async fn cleanup<I>(&self, pinned: I) -> usize
    where
        I: IntoIterator<Item = u64>,
    {
        self.cleanup_at(pinned, Utc::now()).await
    }

    pub async fn cleanup_at<I>(&self, pinned: I, now: DateTime<Utc>) -> usize
    where
        I: IntoIterator<Item = u64>,
    {
        self.sweep_at(pinned, now).await
    }

    /// Cache a status together with its author
    pub async fn ingest(&self, remote: RemoteStatus, accounts: &AccountCache) -> (Arc<Status>, Arc<Account>) {
        let author = accounts.upsert(remote.user.clone()).await;
        let status = self.upsert(remote).await;
        (status, author)
    }
}
