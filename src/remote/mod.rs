//! Remote service boundary
//!
//! The client consumes two things from the remote service:
//! - a request/response accessor (`RemoteService`)
//! - a realtime channel (`StreamSource`)
//!
//! Both report failures as `AppError`, classified by `AppError::class`.

mod http;
mod wire;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::AppError;

pub use http::HttpRemote;
pub use wire::{RemoteAccount, RemoteDirectMessage, RemoteList, RemoteStatus, StreamMessage};

/// Realtime channel: inbound messages until the remote closes it
pub type StreamChannel = BoxStream<'static, Result<StreamMessage, AppError>>;

/// Request/response accessor
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteService: Send + Sync {
    async fn fetch_account(&self, id: u64) -> Result<RemoteAccount, AppError>;

    async fn fetch_list(&self, id: u64) -> Result<RemoteList, AppError>;

    async fn direct_messages_received(&self) -> Result<Vec<RemoteDirectMessage>, AppError>;

    async fn direct_messages_sent(&self) -> Result<Vec<RemoteDirectMessage>, AppError>;

    /// Recent statuses mentioning the authenticated account, newest first
    async fn mentions(&self) -> Result<Vec<RemoteStatus>, AppError>;
}

/// Opens the realtime channel
#[async_trait]
pub trait StreamSource: Send + Sync {
    async fn open(&self) -> Result<StreamChannel, AppError>;
}
