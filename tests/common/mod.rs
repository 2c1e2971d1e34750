//! Common test utilities for E2E tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use chirpstream::error::AppError;
use chirpstream::event::{Event, EventKind};
use chirpstream::remote::{
    RemoteAccount, RemoteDirectMessage, RemoteList, RemoteService, RemoteStatus, StreamChannel,
    StreamMessage, StreamSource,
};
use chirpstream::service::Notification;
use chirpstream::{AppState, config};

pub const ME: u64 = 1;
pub const SCREEN_NAME: &str = "alice";

/// Configuration with the documented defaults
pub fn test_config() -> config::AppConfig {
    config::AppConfig {
        account: config::AccountConfig {
            user_id: ME,
            screen_name: SCREEN_NAME.to_string(),
        },
        remote: config::RemoteConfig {
            base_url: "http://127.0.0.1:9/1.1".to_string(),
            access_token: "test-token".to_string(),
            request_timeout_secs: 30,
        },
        streaming: config::StreamingConfig::default(),
        cache: config::CacheConfig::default(),
        direct_messages: config::DirectMessageConfig::default(),
        metrics: config::MetricsConfig {
            enabled: false,
            bind: "127.0.0.1:0".to_string(),
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

pub fn account(id: u64, screen_name: &str) -> RemoteAccount {
    RemoteAccount {
        id,
        name: screen_name.to_uppercase(),
        screen_name: screen_name.to_string(),
        description: None,
        location: None,
        website: None,
        protected: false,
        verified: false,
        statuses_count: 0,
        favorites_count: 0,
        friends_count: 0,
        followers_count: 0,
        following: false,
        follow_request_sent: false,
    }
}

pub fn status(id: u64, user: RemoteAccount, text: &str) -> RemoteStatus {
    RemoteStatus {
        id,
        text: text.to_string(),
        user,
        created_at: Utc::now(),
        favorite_count: 0,
        retweet_count: 0,
        favorited: false,
        retweeted: false,
        in_reply_to_status_id: None,
    }
}

pub fn direct_message(
    id: &str,
    sender: RemoteAccount,
    recipient: RemoteAccount,
    text: &str,
    created_at: DateTime<Utc>,
) -> RemoteDirectMessage {
    RemoteDirectMessage {
        id: id.to_string(),
        created_at,
        sender,
        recipient,
        text: text.to_string(),
    }
}

/// In-memory remote service
#[derive(Default)]
pub struct FakeRemote {
    pub accounts: Mutex<HashMap<u64, RemoteAccount>>,
    pub lists: Mutex<HashMap<u64, RemoteList>>,
    pub received: Mutex<Vec<RemoteDirectMessage>>,
    pub sent: Mutex<Vec<RemoteDirectMessage>>,
    /// Newest first
    pub mentions: Mutex<Vec<RemoteStatus>>,
    /// Direct message polls answer with a rate-limit error while set
    pub rate_limited: AtomicBool,
    pub account_fetches: AtomicUsize,
}

#[async_trait]
impl RemoteService for FakeRemote {
    async fn fetch_account(&self, id: u64) -> Result<RemoteAccount, AppError> {
        self.account_fetches.fetch_add(1, Ordering::SeqCst);
        self.accounts
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(AppError::NotFound)
    }

    async fn fetch_list(&self, id: u64) -> Result<RemoteList, AppError> {
        self.lists
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(AppError::NotFound)
    }

    async fn direct_messages_received(&self) -> Result<Vec<RemoteDirectMessage>, AppError> {
        if self.rate_limited.load(Ordering::SeqCst) {
            return Err(AppError::RateLimited);
        }
        Ok(self.received.lock().unwrap().clone())
    }

    async fn direct_messages_sent(&self) -> Result<Vec<RemoteDirectMessage>, AppError> {
        if self.rate_limited.load(Ordering::SeqCst) {
            return Err(AppError::RateLimited);
        }
        Ok(self.sent.lock().unwrap().clone())
    }

    async fn mentions(&self) -> Result<Vec<RemoteStatus>, AppError> {
        Ok(self.mentions.lock().unwrap().clone())
    }
}

/// Outcome of one `open` call
pub enum Connection {
    Refuse(AppError),
    Live,
}

pub type StreamFeed = mpsc::UnboundedSender<Result<StreamMessage, AppError>>;

/// Stream source playing a script of connection outcomes
///
/// Once the script runs out every `open` succeeds.
pub struct FakeStream {
    script: Mutex<VecDeque<Connection>>,
    feeds: mpsc::UnboundedSender<StreamFeed>,
    opened: AtomicUsize,
}

#[async_trait]
impl StreamSource for FakeStream {
    async fn open(&self) -> Result<StreamChannel, AppError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Connection::Refuse(error)) => Err(error),
            Some(Connection::Live) | None => {
                let (tx, rx) = mpsc::unbounded_channel();
                let _ = self.feeds.send(tx);
                Ok(tokio_stream::wrappers::UnboundedReceiverStream::new(rx).boxed())
            }
        }
    }
}

/// Application wired to fakes, with every event recorded
pub struct TestApp {
    pub state: AppState,
    pub remote: Arc<FakeRemote>,
    stream: Arc<FakeStream>,
    feeds: mpsc::UnboundedReceiver<StreamFeed>,
    events: Arc<Mutex<Vec<Event>>>,
    pub notifications: mpsc::UnboundedReceiver<Notification>,
}

impl TestApp {
    pub fn new(script: Vec<Connection>) -> Self {
        Self::with_remote(script, FakeRemote::default())
    }

    pub fn with_remote(script: Vec<Connection>, remote: FakeRemote) -> Self {
        let (feeds_tx, feeds) = mpsc::unbounded_channel();
        let stream = Arc::new(FakeStream {
            script: Mutex::new(script.into()),
            feeds: feeds_tx,
            opened: AtomicUsize::new(0),
        });
        let remote = Arc::new(remote);

        let state = AppState::with_remote(test_config(), remote.clone(), stream.clone());

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        state.bus.subscribe(EventKind::Any, move |event| {
            sink.lock().unwrap().push(event.clone());
            Ok(())
        });

        let notifications = state
            .notifier
            .take_receiver()
            .expect("fresh notifier has a receiver");

        Self {
            state,
            remote,
            stream,
            feeds,
            events,
            notifications,
        }
    }

    /// Wait for the session to open its next channel
    pub async fn next_feed(&mut self) -> StreamFeed {
        tokio::time::timeout(Duration::from_secs(3600), self.feeds.recv())
            .await
            .expect("stream was opened")
            .expect("stream source alive")
    }

    pub fn opened(&self) -> usize {
        self.stream.opened.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn events_of(&self, kind: EventKind) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|event| event.kind().is_a(kind))
            .collect()
    }

    /// Texts of message events of `kind`
    pub fn messages(&self, kind: EventKind) -> Vec<String> {
        self.events_of(kind)
            .iter()
            .filter_map(|event| event.message().map(str::to_string))
            .collect()
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        let mut drained = Vec::new();
        while let Ok(notification) = self.notifications.try_recv() {
            drained.push(notification);
        }
        drained
    }
}

/// Let spawned tasks run to their next await point
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

pub fn friends() -> Result<StreamMessage, AppError> {
    Ok(StreamMessage::Friends { ids: vec![2, 3] })
}

/// Metrics and health endpoints served on an ephemeral port
pub struct TestServer {
    pub addr: String,
    pub app: TestApp,
    pub client: reqwest::Client,
}

impl TestServer {
    pub async fn new() -> Self {
        chirpstream::metrics::init_metrics();

        let app = TestApp::new(Vec::new());
        let router = chirpstream::api::metrics_router(app.state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            addr,
            app,
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }
}
