//! Wire representations of remote entities
//!
//! These are what the REST accessor and the realtime channel hand us. Cached
//! entities are only ever built from them through the caches' `upsert`.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Account as returned by the remote service
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteAccount {
    pub id: u64,
    pub name: String,
    pub screen_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, alias = "url")]
    pub website: Option<String>,
    #[serde(default)]
    pub protected: bool,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub statuses_count: u64,
    #[serde(default, alias = "favourites_count")]
    pub favorites_count: u64,
    #[serde(default)]
    pub friends_count: u64,
    #[serde(default)]
    pub followers_count: u64,
    /// Whether the authenticated account follows this one
    #[serde(default)]
    pub following: bool,
    /// Whether the authenticated account has a pending follow request
    #[serde(default)]
    pub follow_request_sent: bool,
}

/// List as returned by the remote service
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteList {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub full_name: String,
    /// "public" or "private"
    pub mode: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub member_count: u64,
    #[serde(default)]
    pub subscriber_count: u64,
}

/// Status as returned by the remote service
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteStatus {
    pub id: u64,
    pub text: String,
    pub user: RemoteAccount,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub favorite_count: u64,
    #[serde(default)]
    pub retweet_count: u64,
    #[serde(default)]
    pub favorited: bool,
    #[serde(default)]
    pub retweeted: bool,
    #[serde(default)]
    pub in_reply_to_status_id: Option<u64>,
}

/// Direct message as returned by the remote service
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteDirectMessage {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub sender: RemoteAccount,
    pub recipient: RemoteAccount,
    pub text: String,
}

/// One entry of the realtime channel
///
/// Each line of the stream is a JSON object tagged by `"type"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    Status(RemoteStatus),
    Favorite {
        source: RemoteAccount,
        target_object: RemoteStatus,
    },
    Follow {
        source: RemoteAccount,
        target: RemoteAccount,
    },
    DirectMessage(RemoteDirectMessage),
    /// Sent once after the channel opens; confirms the connection
    Friends {
        #[serde(default)]
        ids: Vec<u64>,
    },
    Delete {
        status_id: u64,
    },
    Error {
        message: String,
    },
}

impl StreamMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Status(_) => "status",
            Self::Favorite { .. } => "favorite",
            Self::Follow { .. } => "follow",
            Self::DirectMessage(_) => "direct_message",
            Self::Friends { .. } => "friends",
            Self::Delete { .. } => "delete",
            Self::Error { .. } => "error",
        }
    }
}
