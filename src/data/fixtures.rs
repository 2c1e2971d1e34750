//! Remote payload builders shared by unit tests

use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::{Account, CachePolicy, EntityCache, Status};
use crate::remote::{RemoteAccount, RemoteDirectMessage, RemoteList, RemoteStatus};

pub(crate) fn remote_account(id: u64, followers_count: u64) -> RemoteAccount {
    RemoteAccount {
        id,
        name: format!("User {id}"),
        screen_name: format!("user{id}"),
        description: None,
        location: Some("Tokyo".to_string()),
        website: None,
        protected: false,
        verified: false,
        statuses_count: 0,
        favorites_count: 0,
        friends_count: 0,
        followers_count,
        following: false,
        follow_request_sent: false,
    }
}

pub(crate) fn remote_list(id: u64, member_count: u64) -> RemoteList {
    RemoteList {
        id,
        name: format!("list{id}"),
        slug: format!("list-{id}"),
        full_name: format!("@owner/list-{id}"),
        mode: "public".to_string(),
        description: None,
        member_count,
        subscriber_count: 0,
    }
}

pub(crate) fn remote_status(id: u64, user_id: u64, text: &str) -> RemoteStatus {
    RemoteStatus {
        id,
        text: text.to_string(),
        user: remote_account(user_id, 0),
        created_at: Utc::now(),
        favorite_count: 0,
        retweet_count: 0,
        favorited: false,
        retweeted: false,
        in_reply_to_status_id: None,
    }
}

pub(crate) fn remote_direct_message(
    id: &str,
    sender_id: u64,
    recipient_id: u64,
    text: &str,
    created_at: DateTime<Utc>,
) -> RemoteDirectMessage {
    RemoteDirectMessage {
        id: id.to_string(),
        created_at,
        sender: remote_account(sender_id, 0),
        recipient: remote_account(recipient_id, 0),
        text: text.to_string(),
    }
}

/// An account obtained through a throwaway cache
pub(crate) async fn cached_account(id: u64) -> Arc<Account> {
    EntityCache::new("account", CachePolicy::unthrottled())
        .upsert(remote_account(id, 0))
        .await
}

/// A status obtained through a throwaway cache
pub(crate) async fn cached_status(id: u64, user_id: u64, text: &str) -> Arc<Status> {
    EntityCache::new("status", CachePolicy::unthrottled())
        .upsert(remote_status(id, user_id, text))
        .await
}
