//! In-memory implementation of `Store`.
//!
//! Used by tests and usable as an ephemeral backend; all state is lost on
//! restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{DecisionClaim, NewPost, PostRecord, Store, StoreError, UserRecord};
use crate::localization::Language;
use crate::types::{MessageId, PostId, PostStatus, TopicId, UserId, Verdict};

#[derive(Default)]
struct Inner {
    users: HashMap<UserId, UserRecord>,
    posts: HashMap<PostId, PostRecord>,
    next_post_id: i64,
}

/// In-memory store: two maps behind one `RwLock` so the conditional decision
/// transition is atomic with respect to concurrent claims.
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                users: HashMap::new(),
                posts: HashMap::new(),
                next_post_id: 1,
            }),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn upsert_user(
        &self,
        id: UserId,
        handle: Option<String>,
        display_name: String,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.users.entry(id).or_insert_with(|| UserRecord {
            id,
            handle,
            display_name,
            language: Language::default(),
            topic: None,
            registered_at: Utc::now(),
        });
        Ok(())
    }

    async fn user(&self, id: UserId) -> Result<Option<UserRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.users.get(&id).cloned())
    }

    async fn set_language(&self, id: UserId, language: Language) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(user) = inner.users.get_mut(&id) {
            user.language = language;
        }
        Ok(())
    }

    async fn language(&self, id: UserId) -> Result<Language, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .get(&id)
            .map(|u| u.language)
            .unwrap_or_default())
    }

    async fn topic(&self, id: UserId) -> Result<Option<TopicId>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.users.get(&id).and_then(|u| u.topic))
    }

    async fn assign_topic(&self, id: UserId, topic: TopicId) -> Result<TopicId, StoreError> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::storage("assign_topic", format!("unknown user {}", id)))?;
        match user.topic {
            Some(existing) => Ok(existing),
            None => {
                user.topic = Some(topic);
                Ok(topic)
            }
        }
    }

    async fn create_post(&self, post: NewPost) -> Result<PostId, StoreError> {
        let mut inner = self.inner.write().await;
        let id = PostId(inner.next_post_id);
        inner.next_post_id += 1;
        inner.posts.insert(
            id,
            PostRecord {
                id,
                user: post.user,
                photo: post.photo,
                age: post.age,
                country: post.country,
                country_emoji: post.country_emoji,
                is_anonymous: post.is_anonymous,
                display_name: post.display_name,
                moderation_chat: post.moderation_chat,
                moderation_message: post.moderation_message,
                decision_message: None,
                published_message: None,
                status: PostStatus::Pending,
                created_at: Utc::now(),
                published_at: None,
            },
        );
        Ok(id)
    }

    async fn post(&self, id: PostId) -> Result<Option<PostRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.posts.get(&id).cloned())
    }

    async fn set_decision_message(
        &self,
        id: PostId,
        message: MessageId,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(post) = inner.posts.get_mut(&id) {
            post.decision_message = Some(message);
        }
        Ok(())
    }

    async fn set_published_message(
        &self,
        id: PostId,
        message: MessageId,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(post) = inner.posts.get_mut(&id) {
            post.published_message = Some(message);
        }
        Ok(())
    }

    async fn delete_post(&self, id: PostId) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.posts.remove(&id);
        Ok(())
    }

    async fn claim_decision(
        &self,
        id: PostId,
        verdict: Verdict,
        decided_at: DateTime<Utc>,
    ) -> Result<DecisionClaim, StoreError> {
        // Single write lock: check-and-set is atomic here, matching the
        // SQL conditional UPDATE.
        let mut inner = self.inner.write().await;
        let post = match inner.posts.get_mut(&id) {
            Some(post) => post,
            None => return Ok(DecisionClaim::NotFound),
        };
        if post.status.is_terminal() {
            return Ok(DecisionClaim::AlreadyDecided(post.status));
        }
        post.status = verdict.target_status();
        if verdict == Verdict::Approve {
            post.published_at = Some(decided_at);
        }
        Ok(DecisionClaim::Claimed(post.clone()))
    }

    async fn status_counts(&self) -> Result<Vec<(PostStatus, u64)>, StoreError> {
        let inner = self.inner.read().await;
        let mut counts: Vec<(PostStatus, u64)> = vec![
            (PostStatus::Pending, 0),
            (PostStatus::Published, 0),
            (PostStatus::Rejected, 0),
        ];
        for post in inner.posts.values() {
            if let Some(entry) = counts.iter_mut().find(|(status, _)| *status == post.status) {
                entry.1 += 1;
            }
        }
        Ok(counts)
    }

    async fn pending_posts(&self) -> Result<Vec<PostRecord>, StoreError> {
        let inner = self.inner.read().await;
        let mut posts: Vec<PostRecord> = inner
            .posts
            .values()
            .filter(|post| post.status == PostStatus::Pending)
            .cloned()
            .collect();
        posts.sort_by_key(|post| post.id);
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatId;

    fn new_post(user: UserId) -> NewPost {
        NewPost {
            user,
            photo: "photo-1".into(),
            age: 30,
            country: "Japan".to_string(),
            country_emoji: "\u{1F1EF}\u{1F1F5}".to_string(),
            is_anonymous: false,
            display_name: "@bob".to_string(),
            moderation_chat: ChatId(-100),
            moderation_message: MessageId(10),
        }
    }

    #[tokio::test]
    async fn test_upsert_user_is_idempotent() {
        let store = InMemoryStore::new();
        store
            .upsert_user(UserId(1), Some("@bob".into()), "Bob".into())
            .await
            .unwrap();
        store.set_language(UserId(1), Language::Ru).await.unwrap();

        // Re-registering must not reset the language.
        store
            .upsert_user(UserId(1), Some("@bob".into()), "Bob".into())
            .await
            .unwrap();
        assert_eq!(store.language(UserId(1)).await.unwrap(), Language::Ru);
    }

    #[tokio::test]
    async fn test_language_defaults_for_unknown_user() {
        let store = InMemoryStore::new();
        assert_eq!(store.language(UserId(99)).await.unwrap(), Language::En);
    }

    #[tokio::test]
    async fn test_assign_topic_first_writer_wins() {
        let store = InMemoryStore::new();
        store.upsert_user(UserId(1), None, "Bob".into()).await.unwrap();

        let first = store.assign_topic(UserId(1), TopicId(5)).await.unwrap();
        assert_eq!(first, TopicId(5));

        // A later assignment returns the original topic untouched.
        let second = store.assign_topic(UserId(1), TopicId(9)).await.unwrap();
        assert_eq!(second, TopicId(5));
        assert_eq!(store.topic(UserId(1)).await.unwrap(), Some(TopicId(5)));
    }

    #[tokio::test]
    async fn test_post_ids_are_sequential() {
        let store = InMemoryStore::new();
        let first = store.create_post(new_post(UserId(1))).await.unwrap();
        let second = store.create_post(new_post(UserId(1))).await.unwrap();
        assert_eq!(first, PostId(1));
        assert_eq!(second, PostId(2));
    }

    #[tokio::test]
    async fn test_claim_decision_not_found() {
        let store = InMemoryStore::new();
        let claim = store
            .claim_decision(PostId(42), Verdict::Approve, Utc::now())
            .await
            .unwrap();
        assert_eq!(claim, DecisionClaim::NotFound);
    }

    #[tokio::test]
    async fn test_claim_decision_first_wins() {
        let store = InMemoryStore::new();
        let id = store.create_post(new_post(UserId(1))).await.unwrap();

        let first = store
            .claim_decision(id, Verdict::Approve, Utc::now())
            .await
            .unwrap();
        let DecisionClaim::Claimed(record) = first else {
            panic!("first claim should win");
        };
        assert_eq!(record.status, PostStatus::Published);
        assert!(record.published_at.is_some());

        let second = store
            .claim_decision(id, Verdict::Reject, Utc::now())
            .await
            .unwrap();
        assert_eq!(
            second,
            DecisionClaim::AlreadyDecided(PostStatus::Published)
        );

        // Stored status reflects the winner.
        let post = store.post(id).await.unwrap().unwrap();
        assert_eq!(post.status, PostStatus::Published);
    }

    #[tokio::test]
    async fn test_reject_does_not_set_published_at() {
        let store = InMemoryStore::new();
        let id = store.create_post(new_post(UserId(1))).await.unwrap();
        let claim = store
            .claim_decision(id, Verdict::Reject, Utc::now())
            .await
            .unwrap();
        let DecisionClaim::Claimed(record) = claim else {
            panic!("claim should succeed");
        };
        assert_eq!(record.status, PostStatus::Rejected);
        assert!(record.published_at.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_opposing_claims_exactly_one_wins() {
        use std::sync::Arc;

        let store = Arc::new(InMemoryStore::new());
        let id = store.create_post(new_post(UserId(1))).await.unwrap();

        let approve = {
            let store = store.clone();
            tokio::spawn(async move {
                store.claim_decision(id, Verdict::Approve, Utc::now()).await
            })
        };
        let reject = {
            let store = store.clone();
            tokio::spawn(
                async move { store.claim_decision(id, Verdict::Reject, Utc::now()).await },
            )
        };

        let a = approve.await.unwrap().unwrap();
        let r = reject.await.unwrap().unwrap();

        let claimed = [&a, &r]
            .iter()
            .filter(|c| matches!(c, DecisionClaim::Claimed(_)))
            .count();
        let decided = [&a, &r]
            .iter()
            .filter(|c| matches!(c, DecisionClaim::AlreadyDecided(_)))
            .count();
        assert_eq!((claimed, decided), (1, 1));

        let post = store.post(id).await.unwrap().unwrap();
        assert!(post.status.is_terminal());
    }

    #[tokio::test]
    async fn test_pending_posts_and_counts() {
        let store = InMemoryStore::new();
        let a = store.create_post(new_post(UserId(1))).await.unwrap();
        let _b = store.create_post(new_post(UserId(2))).await.unwrap();
        store
            .claim_decision(a, Verdict::Reject, Utc::now())
            .await
            .unwrap();

        let pending = store.pending_posts().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].user, UserId(2));

        let counts = store.status_counts().await.unwrap();
        assert!(counts.contains(&(PostStatus::Pending, 1)));
        assert!(counts.contains(&(PostStatus::Rejected, 1)));
        assert!(counts.contains(&(PostStatus::Published, 0)));
    }
}
