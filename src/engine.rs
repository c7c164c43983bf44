//! Event dispatch: one entry point for user events, one for moderator
//! decisions.
//!
//! The engine owns the session registry and the lifecycle manager. Events
//! for one user serialize on that user's session; different users proceed
//! independently. Prompt delivery is best effort and never blocks a state
//! transition from committing.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::channel::MessagingChannel;
use crate::conversation::{
    transition, ConversationState, Effect, SessionStore, Step, TransitionContext, UserEvent,
};
use crate::country::CountryCatalog;
use crate::localization::{text, welcome, Language, TextKey};
use crate::moderation::{DecisionError, PostLifecycle};
use crate::store::{Store, StoreError};
use crate::types::{ChatId, PostId, PostStatus, UserId, Verdict};

/// What a decision event produced, for the moderator-facing response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionOutcome {
    Committed(PostStatus),
    AlreadyDecided(PostStatus),
    NotFound,
    Failed,
}

impl DecisionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Committed(PostStatus::Published) => "published",
            Self::Committed(_) => "rejected",
            Self::AlreadyDecided(_) => "already_decided",
            Self::NotFound => "not_found",
            Self::Failed => "failed",
        }
    }
}

pub struct Engine {
    store: Arc<dyn Store>,
    channel: Arc<dyn MessagingChannel>,
    sessions: SessionStore,
    lifecycle: PostLifecycle,
    catalog: CountryCatalog,
}

impl Engine {
    pub fn new(
        store: Arc<dyn Store>,
        channel: Arc<dyn MessagingChannel>,
        moderation_chat: ChatId,
        output_chat: ChatId,
        bot_link: String,
    ) -> Self {
        let lifecycle = PostLifecycle::new(
            store.clone(),
            channel.clone(),
            moderation_chat,
            output_chat,
            bot_link,
        );
        Self {
            store,
            channel,
            sessions: SessionStore::new(),
            lifecycle,
            catalog: CountryCatalog::new(),
        }
    }

    /// Process one inbound user event.
    pub async fn handle_user_event(
        &self,
        user: UserId,
        event: UserEvent,
    ) -> Result<(), StoreError> {
        // Every event gets a user row, so language and topic writes always
        // have a target even when the first contact is not a Start.
        let known = self.store.user(user).await?.is_some();
        match &event {
            UserEvent::Start {
                handle,
                display_name,
            } => {
                self.store
                    .upsert_user(user, handle.clone(), display_name.clone())
                    .await?;
            }
            _ if !known => {
                self.store.upsert_user(user, None, user.to_string()).await?;
            }
            _ => {}
        }

        // Returning users go straight to the photo prompt; everyone else
        // picks a language first.
        let initial = if known && !matches!(event, UserEvent::Start { .. }) {
            ConversationState::AwaitingPhoto
        } else {
            ConversationState::SelectingLanguage
        };
        let session = self.sessions.get_or_create(user, initial).await;
        let mut session = session.lock().await;
        session.touch();

        let user_record = self.store.user(user).await?;
        let mut language = user_record
            .as_ref()
            .map(|u| u.language)
            .unwrap_or_default();
        let handle = user_record.as_ref().and_then(|u| u.handle.as_deref());
        let ctx = TransitionContext {
            handle,
            catalog: &self.catalog,
        };

        info!(user = %user, event = event.log_summary(), state = session.state.name(), "user event");
        let result = transition(&session.state, event, &ctx);

        for effect in result.effects {
            match effect {
                Effect::SetLanguage(lang) => {
                    self.store.set_language(user, lang).await?;
                    language = lang;
                }
                Effect::Prompt(key) => self.prompt(user, language, key).await,
                Effect::Welcome => {
                    let name = user_record
                        .as_ref()
                        .map(|u| u.display_name.clone())
                        .unwrap_or_else(|| user.to_string());
                    let greeting = welcome(language, &name);
                    if let Err(e) = self.channel.send_text(user, &greeting).await {
                        warn!(user = %user, error = %e, "failed to deliver greeting");
                    }
                }
            }
        }

        match result.step {
            Step::Stay => {}
            Step::Advance(state) => session.state = state,
            Step::Cancelled => {
                drop(session);
                self.sessions.remove(user).await;
            }
            Step::Finished(draft) => {
                drop(session);
                self.sessions.remove(user).await;
                match self.lifecycle.submit(user, draft).await {
                    Ok(post) => {
                        info!(user = %user, post = %post, "submission accepted");
                        self.prompt(user, language, TextKey::Submitted).await;
                    }
                    Err(e) => {
                        warn!(user = %user, error = %e, "submission failed");
                        self.prompt(user, language, TextKey::SubmitError).await;
                    }
                }
            }
        }
        Ok(())
    }

    /// Process one moderator decision event.
    pub async fn handle_decision(&self, post: PostId, verdict: Verdict) -> DecisionOutcome {
        let result = match verdict {
            Verdict::Approve => self.lifecycle.approve(post).await,
            Verdict::Reject => self.lifecycle.reject(post).await,
        };
        match result {
            Ok(()) => DecisionOutcome::Committed(verdict.target_status()),
            Err(DecisionError::AlreadyDecided(_, status)) => {
                DecisionOutcome::AlreadyDecided(status)
            }
            Err(DecisionError::NotFound(_)) => DecisionOutcome::NotFound,
            Err(e) => {
                warn!(post = %post, error = %e, "decision processing failed");
                DecisionOutcome::Failed
            }
        }
    }

    pub async fn open_sessions(&self) -> usize {
        self.sessions.open_count().await
    }

    /// One eviction sweep; called periodically from a background task.
    pub async fn evict_idle_sessions(&self, max_idle: Duration) -> usize {
        let evicted = self.sessions.evict_idle(max_idle).await;
        if evicted > 0 {
            info!(evicted, "evicted idle sessions");
        }
        evicted
    }

    async fn prompt(&self, user: UserId, language: Language, key: TextKey) {
        if let Err(e) = self.channel.send_text(user, text(language, key)).await {
            warn!(user = %user, error = %e, "failed to deliver prompt");
        }
    }
}
