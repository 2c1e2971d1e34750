//! Data models
//!
//! Cached representations of remote entities. Accounts, lists and statuses
//! are only constructed through `EntityCache::upsert`; see `cache.rs`.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::cache::CacheEntity;
use super::cache::sealed::Materialize;
use crate::event::EntityKind;
use crate::remote::{RemoteAccount, RemoteDirectMessage, RemoteList, RemoteStatus};

// =============================================================================
// Display helpers
// =============================================================================

/// Display color assigned to an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Blue,
    Green,
    Cyan,
    Yellow,
    Magenta,
}

impl Color {
    const PALETTE: [Color; 6] = [
        Color::Red,
        Color::Blue,
        Color::Green,
        Color::Cyan,
        Color::Yellow,
        Color::Magenta,
    ];

    /// Deterministic color for an account id
    pub fn for_id(id: u64) -> Self {
        Self::PALETTE[(id % Self::PALETTE.len() as u64) as usize]
    }
}

/// Format a timestamp relative to `now`
///
/// Times within the last 24 hours show only the clock time.
pub fn format_timestamp(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    if now.signed_duration_since(ts).num_seconds() < 86_400 {
        ts.format("%H:%M:%S").to_string()
    } else {
        ts.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

// =============================================================================
// Account
// =============================================================================

/// Cached remote user identity
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: u64,
    pub name: String,
    pub screen_name: String,
    pub description: String,
    pub location: String,
    pub website: Option<String>,
    pub protected: bool,
    pub verified: bool,
    pub statuses_count: u64,
    pub favorites_count: u64,
    pub friends_count: u64,
    pub followers_count: u64,
    pub color: Color,
    /// Last time anything referenced this account
    pub touched_at: DateTime<Utc>,
    /// Last time remote data was applied
    pub updated_at: DateTime<Utc>,
}

impl Materialize for Account {
    type Remote = RemoteAccount;

    fn remote_id(remote: &RemoteAccount) -> u64 {
        remote.id
    }

    fn from_remote(remote: &RemoteAccount, now: DateTime<Utc>) -> Self {
        let mut account = Self {
            id: remote.id,
            name: String::new(),
            screen_name: String::new(),
            description: String::new(),
            location: String::new(),
            website: None,
            protected: false,
            verified: false,
            statuses_count: 0,
            favorites_count: 0,
            friends_count: 0,
            followers_count: 0,
            color: Color::for_id(remote.id),
            touched_at: now,
            updated_at: now,
        };
        account.apply(remote, now);
        account
    }

    fn apply(&mut self, remote: &RemoteAccount, now: DateTime<Utc>) {
        self.name = remote.name.clone();
        self.screen_name = remote.screen_name.clone();
        self.description = remote.description.clone().unwrap_or_default();
        self.location = remote.location.clone().unwrap_or_default();
        self.website = remote.website.clone();
        self.protected = remote.protected;
        self.verified = remote.verified;
        self.statuses_count = remote.statuses_count;
        self.favorites_count = remote.favorites_count;
        self.friends_count = remote.friends_count;
        self.followers_count = remote.followers_count;
        self.updated_at = now;
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.touched_at = now;
    }
}

impl CacheEntity for Account {
    const KIND: EntityKind = EntityKind::Account;

    fn id(&self) -> u64 {
        self.id
    }

    fn touched_at(&self) -> DateTime<Utc> {
        self.touched_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

// =============================================================================
// List
// =============================================================================

/// Cached remote list
#[derive(Debug, Clone, Serialize)]
pub struct List {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub full_name: String,
    pub mode: String,
    pub description: String,
    pub member_count: u64,
    pub subscriber_count: u64,
    pub touched_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Materialize for List {
    type Remote = RemoteList;

    fn remote_id(remote: &RemoteList) -> u64 {
        remote.id
    }

    fn from_remote(remote: &RemoteList, now: DateTime<Utc>) -> Self {
        Self {
            id: remote.id,
            name: remote.name.clone(),
            slug: remote.slug.clone(),
            full_name: remote.full_name.clone(),
            mode: remote.mode.clone(),
            description: remote.description.clone().unwrap_or_default(),
            member_count: remote.member_count,
            subscriber_count: remote.subscriber_count,
            touched_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, remote: &RemoteList, now: DateTime<Utc>) {
        self.name = remote.name.clone();
        self.slug = remote.slug.clone();
        self.full_name = remote.full_name.clone();
        self.mode = remote.mode.clone();
        self.description = remote.description.clone().unwrap_or_default();
        self.member_count = remote.member_count;
        self.subscriber_count = remote.subscriber_count;
        self.updated_at = now;
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.touched_at = now;
    }
}

impl CacheEntity for List {
    const KIND: EntityKind = EntityKind::List;

    fn id(&self) -> u64 {
        self.id
    }

    fn touched_at(&self) -> DateTime<Utc> {
        self.touched_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

// =============================================================================
// Status
// =============================================================================

/// Cached post
///
/// The author is referenced by id; resolve it through the account cache.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub id: u64,
    pub text: String,
    pub user_id: u64,
    pub created_at: DateTime<Utc>,
    pub favorite_count: u64,
    pub retweet_count: u64,
    pub favorited: bool,
    pub retweeted: bool,
    pub in_reply_to_status_id: Option<u64>,
    pub touched_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Status {
    /// Whether the text references `@screen_name`
    pub fn mentions(&self, screen_name: &str) -> bool {
        self.text.contains(&format!("@{screen_name}"))
    }

    pub fn date(&self, now: DateTime<Utc>) -> String {
        format_timestamp(self.created_at, now)
    }
}

impl Materialize for Status {
    type Remote = RemoteStatus;

    fn remote_id(remote: &RemoteStatus) -> u64 {
        remote.id
    }

    fn from_remote(remote: &RemoteStatus, now: DateTime<Utc>) -> Self {
        Self {
            id: remote.id,
            text: remote.text.clone(),
            user_id: remote.user.id,
            created_at: remote.created_at,
            favorite_count: remote.favorite_count,
            retweet_count: remote.retweet_count,
            favorited: remote.favorited,
            retweeted: remote.retweeted,
            in_reply_to_status_id: remote.in_reply_to_status_id,
            touched_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, remote: &RemoteStatus, now: DateTime<Utc>) {
        // Text, author and creation time never change for a given id.
        self.favorite_count = remote.favorite_count;
        self.retweet_count = remote.retweet_count;
        self.favorited = remote.favorited;
        self.retweeted = remote.retweeted;
        self.updated_at = now;
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.touched_at = now;
    }
}

impl CacheEntity for Status {
    const KIND: EntityKind = EntityKind::Status;

    fn id(&self) -> u64 {
        self.id
    }

    fn touched_at(&self) -> DateTime<Utc> {
        self.touched_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

// =============================================================================
// Direct Message
// =============================================================================

/// A direct message between the authenticated account and a collocutor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectMessage {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub sender_id: u64,
    pub recipient_id: u64,
    pub text: String,
}

impl DirectMessage {
    pub(crate) fn from_remote(remote: &RemoteDirectMessage) -> Self {
        Self {
            id: remote.id.clone(),
            created_at: remote.created_at,
            sender_id: remote.sender.id,
            recipient_id: remote.recipient.id,
            text: remote.text.clone(),
        }
    }

    /// Replace every field from a re-fetched copy of the same message
    ///
    /// Returns false, leaving `self` untouched, if the ids differ.
    pub fn update(&mut self, remote: &RemoteDirectMessage) -> bool {
        if remote.id != self.id {
            return false;
        }
        *self = Self::from_remote(remote);
        true
    }

    pub fn date(&self, now: DateTime<Utc>) -> String {
        format_timestamp(self.created_at, now)
    }
}
