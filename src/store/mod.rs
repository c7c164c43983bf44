//! Persistent store abstraction.
//!
//! The store is the single arbiter of post status: `claim_decision` is an
//! atomic conditional transition and its zero-rows-affected outcome is the
//! authoritative "already decided" signal. Implementations provide the
//! backend (in-memory, SQLite).

mod memory;
mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::localization::Language;
use crate::types::{ChatId, MessageId, PhotoRef, PostId, PostStatus, TopicId, UserId, Verdict};

/// A stored user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    /// Transport handle ("@name"), if the user has one.
    pub handle: Option<String>,
    pub display_name: String,
    pub language: Language,
    /// Moderation grouping, assigned lazily on first successful submission
    /// and immutable thereafter.
    pub topic: Option<TopicId>,
    pub registered_at: DateTime<Utc>,
}

/// A stored post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostRecord {
    pub id: PostId,
    pub user: UserId,
    pub photo: PhotoRef,
    pub age: u8,
    pub country: String,
    pub country_emoji: String,
    pub is_anonymous: bool,
    pub display_name: String,
    pub moderation_chat: ChatId,
    /// The photo message rendered into the moderation topic. Set at creation:
    /// a post is never discoverable as pending without it.
    pub moderation_message: MessageId,
    /// The separate message carrying the decision buttons.
    pub decision_message: Option<MessageId>,
    /// Where the post landed in the output channel, once published.
    pub published_message: Option<MessageId>,
    pub status: PostStatus,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Fields for creating a post. The moderation message location is part of
/// creation so no partially-located pending row can exist.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub user: UserId,
    pub photo: PhotoRef,
    pub age: u8,
    pub country: String,
    pub country_emoji: String,
    pub is_anonymous: bool,
    pub display_name: String,
    pub moderation_chat: ChatId,
    pub moderation_message: MessageId,
}

/// Outcome of the atomic decision claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionClaim {
    /// This caller committed the transition; the returned record reflects the
    /// new terminal status.
    Claimed(PostRecord),
    /// The post was already in a terminal status (duplicate or racing press).
    AlreadyDecided(PostStatus),
    /// No such post.
    NotFound,
}

/// Errors from store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Backend failure (I/O, SQL, task join).
    Storage {
        operation: &'static str,
        message: String,
    },
    /// A stored row could not be interpreted.
    Corruption { what: String },
}

impl StoreError {
    pub fn storage(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Storage {
            operation,
            message: message.into(),
        }
    }

    pub fn corruption(what: impl Into<String>) -> Self {
        Self::Corruption { what: what.into() }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage { operation, message } => {
                write!(f, "store operation '{}' failed: {}", operation, message)
            }
            Self::Corruption { what } => write!(f, "corrupt stored data: {}", what),
        }
    }
}

impl std::error::Error for StoreError {}

/// Storage backend for users and posts.
#[async_trait]
pub trait Store: Send + Sync {
    /// Create the user if unknown. Repeat calls are no-ops; existing
    /// language/topic assignments are never clobbered.
    async fn upsert_user(
        &self,
        id: UserId,
        handle: Option<String>,
        display_name: String,
    ) -> Result<(), StoreError>;

    async fn user(&self, id: UserId) -> Result<Option<UserRecord>, StoreError>;

    async fn set_language(&self, id: UserId, language: Language) -> Result<(), StoreError>;

    /// The user's language, defaulting when the user is unknown or has never
    /// chosen one.
    async fn language(&self, id: UserId) -> Result<Language, StoreError>;

    async fn topic(&self, id: UserId) -> Result<Option<TopicId>, StoreError>;

    /// Assign a moderation topic if none is assigned yet. Returns the topic
    /// that is durably stored afterwards, which is the existing one when a
    /// concurrent submission won the assignment race.
    async fn assign_topic(&self, id: UserId, topic: TopicId) -> Result<TopicId, StoreError>;

    /// Persist a new post in `pending` status. Ids are sequential and never
    /// reused.
    async fn create_post(&self, post: NewPost) -> Result<PostId, StoreError>;

    async fn post(&self, id: PostId) -> Result<Option<PostRecord>, StoreError>;

    async fn set_decision_message(
        &self,
        id: PostId,
        message: MessageId,
    ) -> Result<(), StoreError>;

    async fn set_published_message(
        &self,
        id: PostId,
        message: MessageId,
    ) -> Result<(), StoreError>;

    /// Remove a post row (submit-failure cleanup only).
    async fn delete_post(&self, id: PostId) -> Result<(), StoreError>;

    /// Atomically transition a pending post to the verdict's terminal status.
    ///
    /// Implemented as a conditional update gated on `status = 'pending'`;
    /// the first caller to commit wins and every later caller observes
    /// `AlreadyDecided`. `published_at` is recorded only for approvals.
    async fn claim_decision(
        &self,
        id: PostId,
        verdict: Verdict,
        decided_at: DateTime<Utc>,
    ) -> Result<DecisionClaim, StoreError>;

    /// Post counts per status, for the status surface.
    async fn status_counts(&self) -> Result<Vec<(PostStatus, u64)>, StoreError>;

    /// All posts still awaiting a decision.
    async fn pending_posts(&self) -> Result<Vec<PostRecord>, StoreError>;
}
