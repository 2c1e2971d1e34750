//! Relationship registry
//!
//! Directed edges between accounts. An edge `(subject, object, kind)` is
//! either present or absent; absence is the negative state (not following,
//! not muting, ...).

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use super::cache::ApplyHook;
use super::models::Account;
use crate::remote::RemoteAccount;

/// Kind of directed relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    Following,
    FollowingRequested,
    Muting,
    Blocking,
}

/// Store of `(subject, object, kind)` edges
#[derive(Debug, Default)]
pub struct RelationshipRegistry {
    edges: RwLock<HashSet<(u64, u64, RelationKind)>>,
}

impl RelationshipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assert or retract one edge; idempotent
    pub fn set(&self, subject: u64, object: u64, kind: RelationKind, present: bool) {
        let mut edges = self.edges.write().unwrap_or_else(PoisonError::into_inner);
        if present {
            edges.insert((subject, object, kind));
        } else {
            edges.remove(&(subject, object, kind));
        }
    }

    pub fn has(&self, subject: u64, object: u64, kind: RelationKind) -> bool {
        self.edges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(subject, object, kind))
    }

    pub fn follow(&self, subject: u64, object: u64) {
        self.set(subject, object, RelationKind::Following, true);
    }

    pub fn unfollow(&self, subject: u64, object: u64) {
        self.set(subject, object, RelationKind::Following, false);
    }

    pub fn following_requested(&self, subject: u64, object: u64) {
        self.set(subject, object, RelationKind::FollowingRequested, true);
    }

    pub fn following_not_requested(&self, subject: u64, object: u64) {
        self.set(subject, object, RelationKind::FollowingRequested, false);
    }

    pub fn mute(&self, subject: u64, object: u64) {
        self.set(subject, object, RelationKind::Muting, true);
    }

    pub fn unmute(&self, subject: u64, object: u64) {
        self.set(subject, object, RelationKind::Muting, false);
    }

    pub fn block(&self, subject: u64, object: u64) {
        self.set(subject, object, RelationKind::Blocking, true);
    }

    pub fn unblock(&self, subject: u64, object: u64) {
        self.set(subject, object, RelationKind::Blocking, false);
    }

    pub fn is_following(&self, subject: u64, object: u64) -> bool {
        self.has(subject, object, RelationKind::Following)
    }

    pub fn is_following_requested(&self, subject: u64, object: u64) -> bool {
        self.has(subject, object, RelationKind::FollowingRequested)
    }

    pub fn is_muting(&self, subject: u64, object: u64) -> bool {
        self.has(subject, object, RelationKind::Muting)
    }

    pub fn is_blocking(&self, subject: u64, object: u64) -> bool {
        self.has(subject, object, RelationKind::Blocking)
    }

    /// Objects `subject` has an edge of `kind` to
    pub fn objects_of(&self, subject: u64, kind: RelationKind) -> Vec<u64> {
        self.edges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(s, _, k)| *s == subject && *k == kind)
            .map(|(_, o, _)| *o)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.edges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Account cache hook mirroring `me`'s follow state from each applied record
pub fn relationship_sync_hook(registry: Arc<RelationshipRegistry>, me: u64) -> ApplyHook<Account> {
    Arc::new(move |remote: &RemoteAccount| {
        if remote.id == me {
            return;
        }
        registry.set(me, remote.id, RelationKind::Following, remote.following);
        registry.set(
            me,
            remote.id,
            RelationKind::FollowingRequested,
            remote.follow_request_sent,
        );
    })
}

/// Relationship queries phrased from an account's point of view
impl Account {
    pub fn following(&self, registry: &RelationshipRegistry, user_id: u64) -> bool {
        registry.is_following(self.id, user_id)
    }

    pub fn followed_by(&self, registry: &RelationshipRegistry, user_id: u64) -> bool {
        registry.is_following(user_id, self.id)
    }

    pub fn following_requested(&self, registry: &RelationshipRegistry, user_id: u64) -> bool {
        registry.is_following_requested(self.id, user_id)
    }

    pub fn following_requested_by(&self, registry: &RelationshipRegistry, user_id: u64) -> bool {
        registry.is_following_requested(user_id, self.id)
    }

    pub fn muting(&self, registry: &RelationshipRegistry, user_id: u64) -> bool {
        registry.is_muting(self.id, user_id)
    }

    pub fn muted_by(&self, registry: &RelationshipRegistry, user_id: u64) -> bool {
        registry.is_muting(user_id, self.id)
    }

    pub fn blocking(&self, registry: &RelationshipRegistry, user_id: u64) -> bool {
        registry.is_blocking(self.id, user_id)
    }

    pub fn blocked_by(&self, registry: &RelationshipRegistry, user_id: u64) -> bool {
        registry.is_blocking(user_id, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{cached_account, remote_account};
    use chrono::Utc;

    #[test]
    fn unfollow_clears_only_that_direction() {
        let registry = RelationshipRegistry::new();
        registry.follow(1, 2);
        registry.follow(2, 1);

        registry.unfollow(1, 2);

        assert!(!registry.is_following(1, 2));
        assert!(registry.is_following(2, 1));
    }

    #[test]
    fn setters_are_idempotent() {
        let registry = RelationshipRegistry::new();
        registry.mute(1, 2);
        registry.mute(1, 2);
        assert_eq!(registry.len(), 1);

        registry.unmute(1, 2);
        registry.unmute(1, 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn kinds_are_independent() {
        let registry = RelationshipRegistry::new();
        registry.block(1, 2);
        registry.following_requested(1, 2);

        registry.following_not_requested(1, 2);

        assert!(registry.is_blocking(1, 2));
        assert!(!registry.is_following_requested(1, 2));
        assert!(!registry.is_following(1, 2));
        assert!(!registry.is_muting(1, 2));
    }

    #[tokio::test]
    async fn account_queries_read_both_directions() {
        let registry = RelationshipRegistry::new();
        let alice = cached_account(1).await;
        registry.follow(1, 2);
        registry.block(3, 1);

        assert!(alice.following(&registry, 2));
        assert!(!alice.followed_by(&registry, 2));
        assert!(alice.blocked_by(&registry, 3));
        assert!(!alice.blocking(&registry, 3));
    }

    #[tokio::test]
    async fn applied_account_updates_sync_follow_edges() {
        use crate::data::cache::{CachePolicy, EntityCache};
        use std::time::Duration;

        let registry = Arc::new(RelationshipRegistry::new());
        let accounts: EntityCache<Account> = EntityCache::new(
            "account",
            CachePolicy {
                update_throttle: Some(Duration::from_secs(60)),
                max_idle: None,
            },
        )
        .with_apply_hook(relationship_sync_hook(registry.clone(), 1));

        let mut remote = remote_account(2, 0);
        remote.following = true;
        remote.follow_request_sent = true;
        let now = Utc::now();
        accounts.upsert_at(remote.clone(), now).await;

        assert!(registry.is_following(1, 2));
        assert!(registry.is_following_requested(1, 2));

        remote.following = false;
        remote.follow_request_sent = false;
        accounts
            .upsert_at(remote.clone(), now + chrono::Duration::seconds(10))
            .await;
        assert!(registry.is_following(1, 2), "throttled update is ignored");

        accounts
            .upsert_at(remote, now + chrono::Duration::seconds(61))
            .await;
        assert!(!registry.is_following(1, 2));
        assert!(!registry.is_following_requested(1, 2));
    }

    #[test]
    fn objects_of_lists_targets() {
        let registry = RelationshipRegistry::new();
        registry.follow(1, 2);
        registry.follow(1, 3);
        registry.mute(1, 4);

        let mut followed = registry.objects_of(1, RelationKind::Following);
        followed.sort();
        assert_eq!(followed, vec![2, 3]);
    }
}
