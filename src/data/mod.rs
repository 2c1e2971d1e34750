//! Data layer module
//!
//! Volatile, in-memory state mirrored from the remote service:
//! - Entity caches (accounts, lists, statuses)
//! - Relationship registry
//! - Direct message conversations

mod cache;
mod conversation;
mod models;
mod relationship;

pub use cache::{
    AccountCache, ApplyHook, CacheEntity, CachePolicy, EntityCache, EntityFetcher, ListCache,
    RemoteFetcher, StatusCache, UpsertOutcome,
};
pub use conversation::{Conversation, ConversationStore};
pub use models::*;
pub use relationship::{RelationKind, RelationshipRegistry, relationship_sync_hook};

#[cfg(test)]
pub(crate) mod fixtures;
