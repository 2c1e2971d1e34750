//! Streaming session
//!
//! Keeps the realtime channel open and turns inbound messages into cache
//! updates and events.
//!
//! # State machine
//!
//! ```text
//! Disconnected --connect()--> Connecting --friends list--> Connected
//!      ^                          |  ^                         |
//!      |                 error    v  | backoff elapsed         | error
//!      |  unclassified         Backoff <-----------------------+
//!      +------------------------------
//! ```
//!
//! A watchdog forces a reconnect when nothing arrives for the keep-alive
//! window.

use futures::StreamExt;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

use super::watchdog::Watchdog;
use crate::config::{AccountConfig, StreamingConfig};
use crate::data::{AccountCache, ConversationStore, StatusCache};
use crate::error::{AppError, ErrorClass};
use crate::event::{ConnectionState, Event, EventBus};
use crate::remote::{StreamMessage, StreamSource};

/// Dependencies of a [`StreamingSession`]
pub struct StreamingContext {
    pub source: Arc<dyn StreamSource>,
    pub bus: Arc<EventBus>,
    pub accounts: Arc<AccountCache>,
    pub statuses: Arc<StatusCache>,
    pub conversations: Arc<ConversationStore>,
}

#[derive(Debug, Clone, Copy)]
struct Timings {
    keep_alive: Duration,
    rate_limit_backoff: Duration,
    network_backoff: Duration,
}

struct Inner {
    ctx: StreamingContext,
    me: AccountConfig,
    timings: Timings,
    state: Mutex<ConnectionState>,
    task: Mutex<Option<JoinHandle<()>>>,
    watchdog: Watchdog,
}

/// Realtime connection to the remote service
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct StreamingSession {
    inner: Arc<Inner>,
}

impl StreamingSession {
    pub fn new(ctx: StreamingContext, me: AccountConfig, config: &StreamingConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                ctx,
                me,
                timings: Timings {
                    keep_alive: config.keep_alive(),
                    rate_limit_backoff: config.rate_limit_backoff(),
                    network_backoff: config.network_backoff(),
                },
                state: Mutex::new(ConnectionState::Disconnected),
                task: Mutex::new(None),
                watchdog: Watchdog::new(),
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Open the realtime channel unless already connecting or connected
    ///
    /// Must be called from within a tokio runtime. Calling it during a
    /// backoff pause starts a fresh attempt immediately.
    pub fn connect(&self) {
        let from = {
            let mut state = self
                .inner
                .state
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if matches!(
                *state,
                ConnectionState::Connecting | ConnectionState::Connected
            ) {
                tracing::debug!(state = %*state, "Connect ignored");
                return;
            }
            std::mem::replace(&mut *state, ConnectionState::Connecting)
        };
        self.announce_transition(from, ConnectionState::Connecting);

        let session = self.clone();
        let task = tokio::spawn(async move { session.run().await });
        self.replace_task(Some(task));
    }

    /// Tear down the channel and stop reconnecting
    pub fn disconnect(&self) {
        self.inner.watchdog.cancel();
        self.replace_task(None);
        self.transition(ConnectionState::Disconnected);
    }

    async fn run(&self) {
        use crate::metrics::{STREAM_CONNECT_ATTEMPTS_TOTAL, STREAM_ERRORS_TOTAL};

        loop {
            STREAM_CONNECT_ATTEMPTS_TOTAL.inc();
            self.emit(Event::Info("Trying to connect to the stream".to_string()));

            let error = self.receive().await;
            self.inner.watchdog.cancel();

            let class = error.class();
            STREAM_ERRORS_TOTAL
                .with_label_values(&[class.as_str()])
                .inc();
            tracing::warn!(%error, class = class.as_str(), "Stream interrupted");
            self.emit(Event::Error(error.user_message()));

            let pause = match class {
                ErrorClass::RateLimited => self.inner.timings.rate_limit_backoff,
                ErrorClass::NetworkUnavailable => self.inner.timings.network_backoff,
                ErrorClass::Other => {
                    self.transition(ConnectionState::Disconnected);
                    return;
                }
            };

            self.transition(ConnectionState::Backoff);
            tracing::info!(seconds = pause.as_secs(), "Backing off before reconnect");
            tokio::time::sleep(pause).await;
            self.transition(ConnectionState::Connecting);
        }
    }

    /// Consume the channel until it fails; always yields the reason
    async fn receive(&self) -> AppError {
        let mut channel = match self.inner.ctx.source.open().await {
            Ok(channel) => channel,
            Err(error) => return error,
        };

        while let Some(item) = channel.next().await {
            match item {
                Ok(message) => {
                    self.keep_alive();
                    self.dispatch(message).await;
                }
                Err(error) => return error,
            }
        }

        AppError::NetworkUnavailable("stream closed by remote".to_string())
    }

    async fn dispatch(&self, message: StreamMessage) {
        use crate::metrics::STREAM_MESSAGES_TOTAL;
        STREAM_MESSAGES_TOTAL
            .with_label_values(&[message.kind()])
            .inc();

        let ctx = &self.inner.ctx;
        match message {
            StreamMessage::Friends { ids } => {
                tracing::debug!(friends = ids.len(), "Received friends list");
                self.confirm_connected();
            }
            StreamMessage::Status(remote) => {
                let (status, author) = ctx.statuses.ingest(remote, &ctx.accounts).await;
                let mentioned = status.mentions(&self.inner.me.screen_name);
                self.emit(Event::StatusReceived {
                    status: status.clone(),
                    author: author.clone(),
                });
                if mentioned {
                    self.emit(Event::Mention { status, author });
                }
            }
            StreamMessage::Favorite {
                source,
                target_object,
            } => {
                let source = ctx.accounts.upsert(source).await;
                let (target, _) = ctx.statuses.ingest(target_object, &ctx.accounts).await;
                self.emit(Event::Favorite {
                    source,
                    target,
                    authenticating_user_id: self.inner.me.user_id,
                });
            }
            StreamMessage::Follow { source, target } => {
                let source = ctx.accounts.upsert(source).await;
                let target = ctx.accounts.upsert(target).await;
                self.emit(Event::Follow { source, target });
            }
            StreamMessage::DirectMessage(remote) => {
                let collocutor_id = if remote.sender.id == self.inner.me.user_id {
                    remote.recipient.id
                } else {
                    remote.sender.id
                };
                let (message, inserted) = ctx.conversations.ingest(remote, collocutor_id).await;
                if inserted {
                    self.emit(Event::DirectMessageReceived {
                        collocutor_id,
                        message,
                    });
                }
            }
            StreamMessage::Delete { status_id } => {
                self.emit(Event::StatusDeleted { status_id });
            }
            StreamMessage::Error { message } => {
                self.emit(Event::Warning(message));
            }
        }
    }

    fn confirm_connected(&self) {
        if self.transition(ConnectionState::Connected) != ConnectionState::Connected {
            self.emit(Event::Info("Connection established".to_string()));
        }
    }

    /// Restart the keep-alive window
    fn keep_alive(&self) {
        let session: Weak<Inner> = Arc::downgrade(&self.inner);
        self.inner
            .watchdog
            .arm(self.inner.timings.keep_alive, move |generation| async move {
                if let Some(inner) = session.upgrade() {
                    StreamingSession { inner }.reconnect_after_silence(generation);
                }
            });
    }

    /// Force a reconnect for the keep-alive window armed as `generation`
    ///
    /// Ignored when traffic re-armed the watchdog, or the loop cancelled it,
    /// after the timer fired.
    fn reconnect_after_silence(&self, generation: u64) {
        if !self.inner.watchdog.is_current(generation) {
            tracing::debug!(generation, "Stale keep-alive expiry ignored");
            return;
        }
        let state = self.state();
        if matches!(
            state,
            ConnectionState::Backoff | ConnectionState::Disconnected
        ) {
            tracing::debug!(%state, "Keep-alive expiry ignored");
            return;
        }

        tracing::warn!(
            error = %AppError::WatchdogTimeout,
            seconds = self.inner.timings.keep_alive.as_secs(),
            "No stream traffic, forcing reconnect"
        );
        self.replace_task(None);
        self.transition(ConnectionState::Disconnected);
        self.emit(Event::Info(
            "Connection timed out, reconnecting".to_string(),
        ));
        self.connect();
    }

    fn replace_task(&self, task: Option<JoinHandle<()>>) {
        let previous = std::mem::replace(
            &mut *self
                .inner
                .task
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            task,
        );
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Move to `to`, publishing the change; returns the previous state
    fn transition(&self, to: ConnectionState) -> ConnectionState {
        let from = std::mem::replace(
            &mut *self
                .inner
                .state
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            to,
        );
        self.announce_transition(from, to);
        from
    }

    fn announce_transition(&self, from: ConnectionState, to: ConnectionState) {
        if from == to {
            return;
        }
        tracing::info!(%from, %to, "Connection state changed");
        self.emit(Event::ConnectionStateChanged { from, to });
    }

    fn emit(&self, event: Event) {
        self.inner.ctx.bus.publish_or_report(event);
    }
}
