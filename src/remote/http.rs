//! HTTP implementation of the remote boundary
//!
//! REST calls are plain JSON GETs. The realtime channel is a long-lived GET
//! whose body is newline-delimited JSON; blank lines are keep-alives.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::wire::{RemoteAccount, RemoteDirectMessage, RemoteList, RemoteStatus, StreamMessage};
use super::{RemoteService, StreamChannel, StreamSource};
use crate::config::RemoteConfig;
use crate::error::AppError;

/// REST accessor and stream source backed by reqwest
#[derive(Clone)]
pub struct HttpRemote {
    /// Client for REST calls (bounded by the request timeout)
    rest: reqwest::Client,
    /// Client for the realtime channel (no overall timeout)
    streaming: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl HttpRemote {
    /// Create new HTTP remote
    ///
    /// # Errors
    /// Returns error if an HTTP client cannot be built
    pub fn new(config: &RemoteConfig) -> Result<Self, AppError> {
        let rest = reqwest::Client::builder()
            .user_agent("Chirpstream/0.1.0")
            .timeout(config.request_timeout())
            .build()?;
        let streaming = reqwest::Client::builder()
            .user_agent("Chirpstream/0.1.0")
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            rest,
            streaming,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, AppError> {
        let response = self
            .rest
            .get(self.url(path))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Map a non-success response to the remote error taxonomy
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(AppError::RateLimited);
    }
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(AppError::NotFound);
    }

    let body = response.text().await.unwrap_or_default();
    Err(AppError::RemoteService(format!(
        "{} {}",
        status,
        body.trim()
    )))
}

#[async_trait]
impl RemoteService for HttpRemote {
    async fn fetch_account(&self, id: u64) -> Result<RemoteAccount, AppError> {
        self.get_json(&format!("accounts/{id}")).await
    }

    async fn fetch_list(&self, id: u64) -> Result<RemoteList, AppError> {
        self.get_json(&format!("lists/{id}")).await
    }

    async fn direct_messages_received(&self) -> Result<Vec<RemoteDirectMessage>, AppError> {
        self.get_json("direct_messages/received").await
    }

    async fn direct_messages_sent(&self) -> Result<Vec<RemoteDirectMessage>, AppError> {
        self.get_json("direct_messages/sent").await
    }

    async fn mentions(&self) -> Result<Vec<RemoteStatus>, AppError> {
        self.get_json("statuses/mentions").await
    }
}

#[async_trait]
impl StreamSource for HttpRemote {
    async fn open(&self) -> Result<StreamChannel, AppError> {
        let response = self
            .streaming
            .get(self.url("stream/user"))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let response = check_status(response).await?;

        // Once the channel is open, any body failure means the connection dropped.
        let chunks = response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|error| AppError::NetworkUnavailable(error.to_string()))
            })
            .boxed();

        Ok(decode_lines(chunks).boxed())
    }
}

/// Split a chunked body into lines and decode each non-blank line
///
/// Lines that fail to decode are skipped with a debug log; the remote may add
/// message types this client does not know.
pub(crate) fn decode_lines(
    chunks: BoxStream<'static, Result<Vec<u8>, AppError>>,
) -> impl futures::Stream<Item = Result<StreamMessage, AppError>> + Send + 'static {
    stream::unfold(
        (chunks, Vec::<u8>::new(), false),
        |(mut chunks, mut buffer, mut finished)| async move {
            loop {
                if let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=pos).collect();
                    match decode_line(&line) {
                        Some(item) => return Some((item, (chunks, buffer, finished))),
                        None => continue,
                    }
                }

                if finished {
                    if buffer.is_empty() {
                        return None;
                    }
                    let line = std::mem::take(&mut buffer);
                    if let Some(item) = decode_line(&line) {
                        return Some((item, (chunks, buffer, finished)));
                    }
                    return None;
                }

                match chunks.next().await {
                    Some(Ok(bytes)) => buffer.extend_from_slice(&bytes),
                    Some(Err(error)) => return Some((Err(error), (chunks, buffer, true))),
                    None => finished = true,
                }
            }
        },
    )
}

fn decode_line(line: &[u8]) -> Option<Result<StreamMessage, AppError>> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    match serde_json::from_str::<StreamMessage>(text) {
        Ok(message) => Some(Ok(message)),
        Err(error) => {
            tracing::debug!(%error, "Skipping undecodable stream line");
            None
        }
    }
}
