//! Data behind the `/status` endpoint.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::store::PostRecord;
use crate::types::{PostStatus, UserId};

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub pending: u64,
    pub published: u64,
    pub rejected: u64,
    pub open_sessions: usize,
}

/// One pending post, as shown to an operator. Photo references are omitted.
#[derive(Debug, Serialize)]
pub struct PendingPostView {
    pub post_id: i64,
    pub user: UserId,
    pub country: String,
    pub is_anonymous: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct StatusData {
    pub summary: StatusSummary,
    pub pending_posts: Vec<PendingPostView>,
    pub version: String,
}

impl StatusData {
    pub fn from_parts(
        counts: &[(PostStatus, u64)],
        pending: &[PostRecord],
        open_sessions: usize,
        version: String,
    ) -> Self {
        let count_of = |status: PostStatus| {
            counts
                .iter()
                .find(|(s, _)| *s == status)
                .map(|(_, n)| *n)
                .unwrap_or(0)
        };
        Self {
            summary: StatusSummary {
                pending: count_of(PostStatus::Pending),
                published: count_of(PostStatus::Published),
                rejected: count_of(PostStatus::Rejected),
                open_sessions,
            },
            pending_posts: pending
                .iter()
                .map(|post| PendingPostView {
                    post_id: post.id.0,
                    user: post.user,
                    country: post.country.clone(),
                    is_anonymous: post.is_anonymous,
                    created_at: post.created_at,
                })
                .collect(),
            version,
        }
    }
}
