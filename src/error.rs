//! Error types for Chirpstream
//!
//! All errors in the client are converted to `AppError`. Errors raised at
//! the remote boundary are classified with [`AppError::class`], which is the
//! only input the streaming session uses to pick a backoff.

use thiserror::Error;

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Remote lookup yielded nothing
    #[error("Resource not found")]
    NotFound,

    /// Remote service refused the request because of rate limiting
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Network unreachable, timed out, or name resolution failed
    #[error("Network is unavailable: {0}")]
    NetworkUnavailable(String),

    /// Any other failure reported by the remote service
    #[error("Remote service error: {0}")]
    RemoteService(String),

    /// HTTP client error, classified lazily by [`AppError::class`]
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Payload from the remote could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// No inbound traffic within the keep-alive deadline
    #[error("Keep-alive deadline expired")]
    WatchdogTimeout,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Retry classification of an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Retry after the rate-limit backoff
    RateLimited,
    /// Retry after the network backoff
    NetworkUnavailable,
    /// Surface and stop retrying
    Other,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::NetworkUnavailable => "network_unavailable",
            Self::Other => "other",
        }
    }
}

impl AppError {
    /// Classify this error for the reconnect policy
    pub fn class(&self) -> ErrorClass {
        match self {
            AppError::RateLimited => ErrorClass::RateLimited,
            AppError::NetworkUnavailable(_) | AppError::WatchdogTimeout => {
                ErrorClass::NetworkUnavailable
            }
            AppError::HttpClient(e) => {
                if e.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) {
                    ErrorClass::RateLimited
                } else if e.is_connect() || e.is_timeout() || e.is_body() {
                    ErrorClass::NetworkUnavailable
                } else {
                    ErrorClass::Other
                }
            }
            _ => ErrorClass::Other,
        }
    }

    /// Message shown to the user in an error event
    pub fn user_message(&self) -> String {
        match self.class() {
            ErrorClass::RateLimited => "Rate limit exceeded".to_string(),
            ErrorClass::NetworkUnavailable => "Network is unavailable".to_string(),
            ErrorClass::Other => match self {
                AppError::RemoteService(msg) => msg.clone(),
                other => other.to_string(),
            },
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
