//! Post lifecycle: submission into the moderation queue, and the terminal
//! approve/reject transitions.
//!
//! The store's conditional status update is the only decision gate. A
//! decision claims the transition first and renders afterwards, so a racing
//! duplicate can never publish twice; render failures after the claim are
//! reported but never roll the status back.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::channel::{ChannelError, MessagingChannel};
use crate::conversation::Draft;
use crate::localization::{text, TextKey};
use crate::render;
use crate::store::{DecisionClaim, NewPost, PostRecord, Store, StoreError};
use crate::types::{ChatId, MessageLocation, PostId, PostStatus, TopicId, UserId, Verdict};

/// Submission failures, surfaced to the submitter as one generic message.
#[derive(Debug)]
pub enum SubmitError {
    /// The draft failed the defensive re-check. Unreachable through the
    /// conversation flow.
    InvalidDraft(&'static str),
    Store(StoreError),
    Render(ChannelError),
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDraft(what) => write!(f, "invalid draft: {}", what),
            Self::Store(e) => write!(f, "submission not persisted: {}", e),
            Self::Render(e) => write!(f, "submission not rendered: {}", e),
        }
    }
}

impl std::error::Error for SubmitError {}

impl From<StoreError> for SubmitError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

/// Decision failures, surfaced to the moderator.
#[derive(Debug)]
pub enum DecisionError {
    /// No post with that identifier exists.
    NotFound(PostId),
    /// A decision was already committed; carries the status that won.
    AlreadyDecided(PostId, PostStatus),
    Store(StoreError),
    /// The claim committed but the post could not be rendered to the output
    /// channel. The status stays as claimed.
    Render(ChannelError),
}

impl fmt::Display for DecisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "post {} not found", id),
            Self::AlreadyDecided(id, status) => {
                write!(f, "post {} already decided: {}", id, status)
            }
            Self::Store(e) => write!(f, "decision not persisted: {}", e),
            Self::Render(e) => write!(f, "decision not rendered: {}", e),
        }
    }
}

impl std::error::Error for DecisionError {}

impl From<StoreError> for DecisionError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

/// Owns every post from creation to its terminal status.
pub struct PostLifecycle {
    store: Arc<dyn Store>,
    channel: Arc<dyn MessagingChannel>,
    moderation_chat: ChatId,
    output_chat: ChatId,
    /// Link embedded in every published caption, pointing back at the intake.
    bot_link: String,
}

impl PostLifecycle {
    pub fn new(
        store: Arc<dyn Store>,
        channel: Arc<dyn MessagingChannel>,
        moderation_chat: ChatId,
        output_chat: ChatId,
        bot_link: String,
    ) -> Self {
        Self {
            store,
            channel,
            moderation_chat,
            output_chat,
            bot_link,
        }
    }

    /// Persist a completed draft as a pending post and render it for review.
    ///
    /// Order matters: the moderation photo is rendered before the row is
    /// created, and the row is deleted again if the decision controls cannot
    /// be rendered. No pending row is ever observable without its moderation
    /// message location.
    pub async fn submit(&self, user: UserId, draft: Draft) -> Result<PostId, SubmitError> {
        validate_draft(&draft)?;

        let topic = self.resolve_topic(user, &draft).await?;

        let caption = render::post_caption(
            &draft.country_emoji,
            &draft.display_name,
            draft.age,
            &self.bot_link,
        );
        let photo_location = self
            .channel
            .send_photo(self.moderation_chat, Some(topic), &draft.photo, &caption)
            .await
            .map_err(SubmitError::Render)?;

        let post_id = self
            .store
            .create_post(NewPost {
                user,
                photo: draft.photo,
                age: draft.age,
                country: draft.country,
                country_emoji: draft.country_emoji,
                is_anonymous: draft.is_anonymous,
                display_name: draft.display_name,
                moderation_chat: self.moderation_chat,
                moderation_message: photo_location.message,
            })
            .await?;

        let controls = self
            .channel
            .send_decision_controls(
                self.moderation_chat,
                Some(topic),
                post_id,
                &render::decision_controls_text(post_id),
            )
            .await;
        let controls = match controls {
            Ok(location) => location,
            Err(e) => {
                // Without controls the post can never be decided; remove the
                // row so no orphaned pending post survives.
                if let Err(cleanup) = self.store.delete_post(post_id).await {
                    warn!(post = %post_id, error = %cleanup, "failed to clean up post after render failure");
                }
                return Err(SubmitError::Render(e));
            }
        };
        self.store
            .set_decision_message(post_id, controls.message)
            .await?;

        info!(post = %post_id, user = %user, topic = %topic, "post submitted for moderation");
        Ok(post_id)
    }

    pub async fn approve(&self, post: PostId) -> Result<(), DecisionError> {
        self.decide(post, Verdict::Approve).await
    }

    pub async fn reject(&self, post: PostId) -> Result<(), DecisionError> {
        self.decide(post, Verdict::Reject).await
    }

    async fn decide(&self, post: PostId, verdict: Verdict) -> Result<(), DecisionError> {
        // Claim before rendering anything. The conditional update is the
        // at-most-once gate for duplicate and racing decisions.
        let record = match self.store.claim_decision(post, verdict, Utc::now()).await? {
            DecisionClaim::Claimed(record) => record,
            DecisionClaim::AlreadyDecided(status) => {
                info!(post = %post, status = %status, "duplicate decision ignored");
                return Err(DecisionError::AlreadyDecided(post, status));
            }
            DecisionClaim::NotFound => return Err(DecisionError::NotFound(post)),
        };

        let published = verdict == Verdict::Approve;
        let mut render_failure = None;
        if published {
            match self
                .channel
                .send_photo(
                    self.output_chat,
                    None,
                    &record.photo,
                    &render::post_caption_for(&record, &self.bot_link),
                )
                .await
            {
                Ok(location) => {
                    self.store
                        .set_published_message(record.id, location.message)
                        .await?;
                }
                Err(e) => {
                    warn!(post = %post, error = %e, "approved post could not be rendered to the output channel");
                    render_failure = Some(e);
                }
            }
        }

        self.clear_controls(&record, published).await;
        self.append_audit_note(&record, published).await;
        self.notify_submitter(&record, published).await;

        info!(post = %post, verdict = ?verdict, "decision committed");
        match render_failure {
            Some(e) => Err(DecisionError::Render(e)),
            None => Ok(()),
        }
    }

    /// The user's moderation topic, created on first submission and reused
    /// afterwards. A resubmission gets a divider so the moderator can tell
    /// attempts apart.
    async fn resolve_topic(&self, user: UserId, draft: &Draft) -> Result<TopicId, SubmitError> {
        if let Some(topic) = self.store.topic(user).await? {
            let divider = render::resubmission_divider(&draft.display_name, user);
            if let Err(e) = self
                .channel
                .send_chat_text(self.moderation_chat, Some(topic), &divider)
                .await
            {
                warn!(user = %user, error = %e, "failed to send resubmission divider");
            }
            return Ok(topic);
        }

        let topic_label = match self.store.user(user).await? {
            Some(record) => render::topic_name(&record.display_name, user),
            None => render::topic_name(&draft.display_name, user),
        };
        let created = self
            .channel
            .create_topic(self.moderation_chat, &topic_label)
            .await
            .map_err(SubmitError::Render)?;
        // A concurrent submission may have assigned a topic in the meantime;
        // the stored value wins.
        let assigned = self.store.assign_topic(user, created).await?;
        Ok(assigned)
    }

    async fn clear_controls(&self, record: &PostRecord, published: bool) {
        let Some(message) = record.decision_message else {
            return;
        };
        let location = MessageLocation {
            chat: record.moderation_chat,
            message,
        };
        let banner = render::decision_banner(record.id, published);
        if let Err(e) = self.channel.clear_controls(location, &banner).await {
            warn!(post = %record.id, error = %e, "failed to clear decision controls");
        }
    }

    async fn append_audit_note(&self, record: &PostRecord, published: bool) {
        let topic = match self.store.topic(record.user).await {
            Ok(topic) => topic,
            Err(e) => {
                warn!(post = %record.id, error = %e, "failed to look up topic for audit note");
                return;
            }
        };
        let note = render::audit_note(record.id, published);
        if let Err(e) = self
            .channel
            .send_chat_text(record.moderation_chat, topic, &note)
            .await
        {
            warn!(post = %record.id, error = %e, "failed to append audit note");
        }
    }

    /// Best effort: a notification failure never undoes the decision.
    async fn notify_submitter(&self, record: &PostRecord, published: bool) {
        let language = match self.store.language(record.user).await {
            Ok(language) => language,
            Err(e) => {
                warn!(user = %record.user, error = %e, "failed to look up language for outcome notification");
                return;
            }
        };
        let key = if published {
            TextKey::PostApproved
        } else {
            TextKey::PostRejected
        };
        if let Err(e) = self
            .channel
            .send_text(record.user, text(language, key))
            .await
        {
            warn!(user = %record.user, error = %e, "failed to deliver outcome notification");
        }
    }
}

fn validate_draft(draft: &Draft) -> Result<(), SubmitError> {
    if draft.photo.0.is_empty() {
        return Err(SubmitError::InvalidDraft("empty photo reference"));
    }
    if !(18..=100).contains(&draft.age) {
        return Err(SubmitError::InvalidDraft("age out of range"));
    }
    if draft.country.is_empty() || draft.country_emoji.is_empty() {
        return Err(SubmitError::InvalidDraft("missing country"));
    }
    if draft.display_name.is_empty() {
        return Err(SubmitError::InvalidDraft("missing display name"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{RecordingChannel, SentMessage};
    use crate::localization::Language;
    use crate::render::ANONYMOUS_DISPLAY_NAME;
    use crate::store::InMemoryStore;

    const MOD_CHAT: ChatId = ChatId(-100);
    const OUT_CHAT: ChatId = ChatId(-200);

    struct Fixture {
        store: Arc<InMemoryStore>,
        channel: Arc<RecordingChannel>,
        lifecycle: PostLifecycle,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let channel = Arc::new(RecordingChannel::new());
        let lifecycle = PostLifecycle::new(
            store.clone(),
            channel.clone(),
            MOD_CHAT,
            OUT_CHAT,
            "https://example.org/bot".to_string(),
        );
        Fixture {
            store,
            channel,
            lifecycle,
        }
    }

    fn draft() -> Draft {
        Draft {
            photo: "photo-1".into(),
            age: 45,
            country: "Japan".to_string(),
            country_emoji: "\u{1F1EF}\u{1F1F5}".to_string(),
            is_anonymous: false,
            display_name: "@bob".to_string(),
        }
    }

    fn anon_draft() -> Draft {
        Draft {
            is_anonymous: true,
            display_name: ANONYMOUS_DISPLAY_NAME.to_string(),
            ..draft()
        }
    }

    async fn register(f: &Fixture, user: UserId) {
        f.store
            .upsert_user(user, Some("@bob".into()), "Bob".into())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_submit_creates_pending_post_with_locations() {
        let f = fixture();
        register(&f, UserId(1)).await;

        let id = f.lifecycle.submit(UserId(1), draft()).await.unwrap();

        let post = f.store.post(id).await.unwrap().unwrap();
        assert_eq!(post.status, PostStatus::Pending);
        assert_eq!(post.moderation_chat, MOD_CHAT);
        assert!(post.decision_message.is_some());

        let sent = f.channel.sent();
        assert!(sent.iter().any(|m| matches!(m, SentMessage::TopicCreated { chat, .. } if *chat == MOD_CHAT)));
        assert!(sent.iter().any(|m| matches!(m, SentMessage::Photo { chat, .. } if *chat == MOD_CHAT)));
        assert!(sent.iter().any(|m| matches!(m, SentMessage::Controls { post, .. } if *post == id)));
    }

    #[tokio::test]
    async fn test_second_submission_reuses_topic() {
        let f = fixture();
        register(&f, UserId(1)).await;

        f.lifecycle.submit(UserId(1), draft()).await.unwrap();
        let first_topic = f.store.topic(UserId(1)).await.unwrap().unwrap();

        f.lifecycle.submit(UserId(1), draft()).await.unwrap();
        assert_eq!(f.store.topic(UserId(1)).await.unwrap(), Some(first_topic));

        // Exactly one topic created; the resubmission announces itself with
        // a divider instead.
        let topics = f
            .channel
            .sent()
            .iter()
            .filter(|m| matches!(m, SentMessage::TopicCreated { .. }))
            .count();
        assert_eq!(topics, 1);
        assert!(f.channel.sent().iter().any(|m| matches!(
            m,
            SentMessage::ChatText { text, .. } if text.contains("New submission")
        )));
    }

    #[tokio::test]
    async fn test_submit_controls_failure_leaves_no_pending_post() {
        let f = fixture();
        register(&f, UserId(1)).await;
        f.channel.fail_on("send_decision_controls");

        let result = f.lifecycle.submit(UserId(1), draft()).await;
        assert!(matches!(result, Err(SubmitError::Render(_))));
        assert!(f.store.pending_posts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_photo_failure_creates_nothing() {
        let f = fixture();
        register(&f, UserId(1)).await;
        f.channel.fail_on("send_photo");

        let result = f.lifecycle.submit(UserId(1), draft()).await;
        assert!(matches!(result, Err(SubmitError::Render(_))));
        assert!(f.store.pending_posts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_approve_publishes_and_notifies() {
        let f = fixture();
        register(&f, UserId(1)).await;
        let id = f.lifecycle.submit(UserId(1), draft()).await.unwrap();

        f.lifecycle.approve(id).await.unwrap();

        let post = f.store.post(id).await.unwrap().unwrap();
        assert_eq!(post.status, PostStatus::Published);
        assert!(post.published_at.is_some());
        assert!(post.published_message.is_some());

        let sent = f.channel.sent();
        assert!(sent.iter().any(|m| matches!(m, SentMessage::Photo { chat, .. } if *chat == OUT_CHAT)));
        assert!(sent.iter().any(|m| matches!(m, SentMessage::ControlsCleared { .. })));

        let notifications = f.channel.user_texts(UserId(1));
        assert_eq!(
            notifications,
            vec![text(Language::En, TextKey::PostApproved).to_string()]
        );
    }

    #[tokio::test]
    async fn test_reject_skips_output_channel() {
        let f = fixture();
        register(&f, UserId(1)).await;
        let id = f.lifecycle.submit(UserId(1), draft()).await.unwrap();

        f.lifecycle.reject(id).await.unwrap();

        let post = f.store.post(id).await.unwrap().unwrap();
        assert_eq!(post.status, PostStatus::Rejected);
        assert!(post.published_at.is_none());
        assert!(!f
            .channel
            .sent()
            .iter()
            .any(|m| matches!(m, SentMessage::Photo { chat, .. } if *chat == OUT_CHAT)));
        assert_eq!(
            f.channel.user_texts(UserId(1)),
            vec![text(Language::En, TextKey::PostRejected).to_string()]
        );
    }

    #[tokio::test]
    async fn test_second_decision_is_already_decided() {
        let f = fixture();
        register(&f, UserId(1)).await;
        let id = f.lifecycle.submit(UserId(1), draft()).await.unwrap();

        f.lifecycle.approve(id).await.unwrap();
        let second = f.lifecycle.reject(id).await;
        assert!(matches!(
            second,
            Err(DecisionError::AlreadyDecided(_, PostStatus::Published))
        ));

        let post = f.store.post(id).await.unwrap().unwrap();
        assert_eq!(post.status, PostStatus::Published);
    }

    #[tokio::test]
    async fn test_decision_on_unknown_post_is_not_found() {
        let f = fixture();
        let result = f.lifecycle.approve(PostId(404)).await;
        assert!(matches!(result, Err(DecisionError::NotFound(_))));
        assert!(f.channel.sent().is_empty());
    }

    #[tokio::test]
    async fn test_anonymous_post_publishes_placeholder_name() {
        let f = fixture();
        register(&f, UserId(1)).await;
        let id = f.lifecycle.submit(UserId(1), anon_draft()).await.unwrap();
        f.lifecycle.approve(id).await.unwrap();

        let published_caption = f
            .channel
            .sent()
            .iter()
            .find_map(|m| match m {
                SentMessage::Photo { chat, caption, .. } if *chat == OUT_CHAT => {
                    Some(caption.clone())
                }
                _ => None,
            })
            .expect("published photo");
        assert!(published_caption.contains(ANONYMOUS_DISPLAY_NAME));
        assert!(!published_caption.contains("@bob"));
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_undo_publish() {
        let f = fixture();
        register(&f, UserId(1)).await;
        let id = f.lifecycle.submit(UserId(1), draft()).await.unwrap();
        f.channel.fail_on("send_text");

        f.lifecycle.approve(id).await.unwrap();
        let post = f.store.post(id).await.unwrap().unwrap();
        assert_eq!(post.status, PostStatus::Published);
    }

    #[tokio::test]
    async fn test_racing_decisions_notify_exactly_once() {
        let f = fixture();
        register(&f, UserId(1)).await;
        let id = f.lifecycle.submit(UserId(1), draft()).await.unwrap();

        let lifecycle = Arc::new(f.lifecycle);
        let approve = {
            let lifecycle = lifecycle.clone();
            tokio::spawn(async move { lifecycle.approve(id).await })
        };
        let reject = {
            let lifecycle = lifecycle.clone();
            tokio::spawn(async move { lifecycle.reject(id).await })
        };

        let a = approve.await.unwrap();
        let r = reject.await.unwrap();

        let wins = [a.is_ok(), r.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(wins, 1);
        let already = [&a, &r]
            .iter()
            .filter(|res| matches!(res, Err(DecisionError::AlreadyDecided(_, _))))
            .count();
        assert_eq!(already, 1);

        assert_eq!(f.channel.user_texts(UserId(1)).len(), 1);
        let post = f.store.post(id).await.unwrap().unwrap();
        assert!(post.status.is_terminal());
    }
}
