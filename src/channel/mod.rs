//! Outbound messaging channel.
//!
//! The engine talks to users and moderators through this trait; the
//! production binding is an HTTP gateway client. All operations are
//! fire-once: retry policy belongs to the caller, and only for transport
//! errors.

mod http;

#[cfg(test)]
mod recording;

pub use http::HttpChannel;

#[cfg(test)]
pub use recording::{RecordingChannel, SentMessage};

use async_trait::async_trait;
use std::fmt;

use crate::types::{ChatId, MessageId, MessageLocation, PhotoRef, PostId, TopicId, UserId};

/// Errors from channel operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The request did not complete (connect, timeout, I/O).
    Transport {
        operation: &'static str,
        message: String,
    },
    /// The gateway answered with a failure.
    Rejected {
        operation: &'static str,
        detail: String,
    },
}

impl ChannelError {
    pub fn transport(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Transport {
            operation,
            message: message.into(),
        }
    }

    pub fn rejected(operation: &'static str, detail: impl Into<String>) -> Self {
        Self::Rejected {
            operation,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport { operation, message } => {
                write!(f, "channel operation '{}' failed: {}", operation, message)
            }
            Self::Rejected { operation, detail } => {
                write!(f, "channel operation '{}' rejected: {}", operation, detail)
            }
        }
    }
}

impl std::error::Error for ChannelError {}

/// Push surface of the messaging transport.
#[async_trait]
pub trait MessagingChannel: Send + Sync {
    /// Send text to a user's private conversation.
    async fn send_text(&self, user: UserId, text: &str) -> Result<MessageId, ChannelError>;

    /// Send text into a chat, optionally under a topic.
    async fn send_chat_text(
        &self,
        chat: ChatId,
        topic: Option<TopicId>,
        text: &str,
    ) -> Result<MessageId, ChannelError>;

    /// Send a photo with caption into a chat; returns where it landed.
    async fn send_photo(
        &self,
        chat: ChatId,
        topic: Option<TopicId>,
        photo: &PhotoRef,
        caption: &str,
    ) -> Result<MessageLocation, ChannelError>;

    /// Create a named topic in a forum-style chat.
    async fn create_topic(&self, chat: ChatId, name: &str) -> Result<TopicId, ChannelError>;

    /// Send the approve/reject controls for a post; returns where the
    /// controls message landed.
    async fn send_decision_controls(
        &self,
        chat: ChatId,
        topic: Option<TopicId>,
        post: PostId,
        text: &str,
    ) -> Result<MessageLocation, ChannelError>;

    /// Replace a controls message with plain text, removing the buttons.
    async fn clear_controls(
        &self,
        location: MessageLocation,
        text: &str,
    ) -> Result<(), ChannelError>;
}
