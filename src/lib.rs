//! Chirpstream - a live, in-memory view of a social-network account
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Remote boundary                           │
//! │  - REST accessor (accounts, lists, direct messages)         │
//! │  - Realtime NDJSON stream                                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - StreamingSession (reconnect, backoff, keep-alive)        │
//! │  - PeriodicFetcher / DirectMessageManager                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - Identity-mapped entity caches                            │
//! │  - Relationship registry, conversations                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Event bus                              │
//! │  - Notifier, Timeline, external subscribers                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: Metrics and health endpoints
//! - `service`: Streaming session, polling, bundled consumers
//! - `data`: Entity caches, relationships, conversations
//! - `event`: Event taxonomy and bus
//! - `remote`: Remote service traits and the HTTP implementation
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod event;
pub mod metrics;
pub mod remote;
pub mod service;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Application state shared by every component
///
/// Cloning is cheap; all clones share the same components.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    pub bus: Arc<event::EventBus>,

    /// Accounts, throttled and evicted per `cache` configuration
    pub accounts: Arc<data::AccountCache>,
    pub lists: Arc<data::ListCache>,
    pub statuses: Arc<data::StatusCache>,
    pub relationships: Arc<data::RelationshipRegistry>,
    pub conversations: Arc<data::ConversationStore>,

    /// Request/response accessor
    pub remote: Arc<dyn remote::RemoteService>,

    pub streaming: service::StreamingSession,
    pub fetcher: Arc<service::PeriodicFetcher>,
    pub direct_messages: Arc<service::DirectMessageManager>,
    pub notifier: Arc<service::Notifier>,
    pub timeline: Arc<service::Timeline>,

    started: Arc<AtomicBool>,
}

impl AppState {
    /// Initialize application state against the configured HTTP remote
    ///
    /// # Errors
    /// Returns error if the HTTP clients cannot be built
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        let http = Arc::new(remote::HttpRemote::new(&config.remote)?);
        tracing::info!(base_url = %config.remote.base_url, "HTTP remote initialized");
        Ok(Self::with_remote(config, http.clone(), http))
    }

    /// Wire every component around the given remote boundary
    pub fn with_remote(
        config: config::AppConfig,
        remote: Arc<dyn remote::RemoteService>,
        stream: Arc<dyn remote::StreamSource>,
    ) -> Self {
        use data::{CachePolicy, EntityCache, RemoteFetcher};

        let bus = Arc::new(event::EventBus::new());
        let relationships = Arc::new(data::RelationshipRegistry::new());
        let fetcher = Arc::new(RemoteFetcher(remote.clone()));

        let accounts = Arc::new(
            EntityCache::new(
                "account",
                CachePolicy {
                    update_throttle: Some(config.cache.account_update_throttle()),
                    max_idle: Some(config.cache.account_max_idle()),
                },
            )
            .with_fetcher(fetcher.clone())
            .with_apply_hook(data::relationship_sync_hook(
                relationships.clone(),
                config.account.user_id,
            ))
            .with_bus(bus.clone()),
        );
        let lists = Arc::new(
            EntityCache::new("list", CachePolicy::unthrottled())
                .with_fetcher(fetcher)
                .with_bus(bus.clone()),
        );
        let statuses = Arc::new(EntityCache::new(
            "status",
            CachePolicy {
                update_throttle: None,
                max_idle: Some(config.cache.status_max_idle()),
            },
        ));
        let conversations = Arc::new(data::ConversationStore::new(accounts.clone()));
        tracing::info!("Caches initialized");

        let streaming = service::StreamingSession::new(
            service::StreamingContext {
                source: stream,
                bus: bus.clone(),
                accounts: accounts.clone(),
                statuses: statuses.clone(),
                conversations: conversations.clone(),
            },
            config.account.clone(),
            &config.streaming,
        );
        let direct_messages = Arc::new(service::DirectMessageManager::new(
            remote.clone(),
            conversations.clone(),
            bus.clone(),
        ));
        let timeline = Arc::new(service::Timeline::new(statuses.clone(), accounts.clone()));

        Self {
            config: Arc::new(config),
            fetcher: Arc::new(service::PeriodicFetcher::new(bus.clone())),
            notifier: Arc::new(service::Notifier::new()),
            bus,
            accounts,
            lists,
            statuses,
            relationships,
            conversations,
            remote,
            streaming,
            direct_messages,
            timeline,
            started: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Attach consumers, connect the stream and start background polling
    ///
    /// Must be called from within a tokio runtime. Later calls are no-ops.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::debug!("Already started");
            return;
        }

        self.notifier.attach(&self.bus);
        self.timeline.attach(&self.bus);

        self.streaming.connect();

        let direct_messages = self.direct_messages.clone();
        self.fetcher.schedule(
            "direct_messages",
            self.config.direct_messages.poll_interval(),
            move || {
                let direct_messages = direct_messages.clone();
                async move { direct_messages.fetch().await }
            },
        );

        let (accounts, statuses, timeline) = (
            self.accounts.clone(),
            self.statuses.clone(),
            self.timeline.clone(),
        );
        self.fetcher.schedule(
            "cache_cleanup",
            self.config.cache.cleanup_interval(),
            move || {
                let (accounts, statuses, timeline) =
                    (accounts.clone(), statuses.clone(), timeline.clone());
                async move {
                    sweep_caches(&accounts, &statuses, &timeline, chrono::Utc::now()).await;
                    Ok(())
                }
            },
        );

        let (timeline, remote, bus) = (self.timeline.clone(), self.remote.clone(), self.bus.clone());
        tokio::spawn(async move {
            if let Err(error) = timeline.fetch_mentions(remote.as_ref()).await {
                tracing::warn!(%error, "Initial mentions fetch failed");
                bus.publish_or_report(event::Event::Error(error.user_message()));
            }
        });

        tracing::info!("Application started");
    }

    /// Sweep the status cache, then the account cache, against `now`
    ///
    /// Returns the number of evicted statuses and accounts.
    pub async fn sweep_caches_at(&self, now: chrono::DateTime<chrono::Utc>) -> (usize, usize) {
        sweep_caches(&self.accounts, &self.statuses, &self.timeline, now).await
    }

    /// Stop polling and close the stream
    pub fn shutdown(&self) {
        self.fetcher.shutdown();
        self.streaming.disconnect();
        tracing::info!("Application stopped");
    }
}

/// Statuses still shown in a feed are kept; accounts are swept after the
/// statuses so that authors of evicted statuses can go too
async fn sweep_caches(
    accounts: &data::AccountCache,
    statuses: &data::StatusCache,
    timeline: &service::Timeline,
    now: chrono::DateTime<chrono::Utc>,
) -> (usize, usize) {
    let statuses_evicted = statuses.cleanup_at(timeline.feed_ids(), now).await;
    let accounts_evicted = accounts.cleanup_at(statuses, now).await;
    tracing::debug!(
        statuses = statuses_evicted,
        accounts = accounts_evicted,
        "Caches swept"
    );
    (statuses_evicted, accounts_evicted)
}
