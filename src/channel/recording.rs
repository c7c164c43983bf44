//! Recording test double for `MessagingChannel`.
//!
//! Records every outbound operation, assigns ascending message/topic ids,
//! and can be told to fail specific operations for failure-path tests.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::types::{ChatId, MessageId, MessageLocation, PhotoRef, PostId, TopicId, UserId};

use super::{ChannelError, MessagingChannel};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentMessage {
    UserText {
        user: UserId,
        text: String,
    },
    ChatText {
        chat: ChatId,
        topic: Option<TopicId>,
        text: String,
    },
    Photo {
        chat: ChatId,
        topic: Option<TopicId>,
        photo: PhotoRef,
        caption: String,
        message: MessageId,
    },
    TopicCreated {
        chat: ChatId,
        name: String,
        topic: TopicId,
    },
    Controls {
        chat: ChatId,
        topic: Option<TopicId>,
        post: PostId,
        message: MessageId,
    },
    ControlsCleared {
        location: MessageLocation,
        text: String,
    },
}

struct Inner {
    sent: Vec<SentMessage>,
    failing: HashSet<&'static str>,
    next_message_id: i64,
    next_topic_id: i64,
}

pub struct RecordingChannel {
    inner: Mutex<Inner>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                sent: Vec::new(),
                failing: HashSet::new(),
                next_message_id: 1,
                next_topic_id: 1,
            }),
        }
    }

    /// Make the named operation fail from now on.
    pub fn fail_on(&self, operation: &'static str) {
        self.inner.lock().unwrap().failing.insert(operation);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.inner.lock().unwrap().sent.clone()
    }

    /// Texts sent to one user's private conversation, in order.
    pub fn user_texts(&self, user: UserId) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .sent
            .iter()
            .filter_map(|m| match m {
                SentMessage::UserText { user: u, text } if *u == user => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn check(&self, operation: &'static str) -> Result<(), ChannelError> {
        if self.inner.lock().unwrap().failing.contains(operation) {
            return Err(ChannelError::transport(operation, "injected failure"));
        }
        Ok(())
    }

    fn next_message(&self) -> MessageId {
        let mut inner = self.inner.lock().unwrap();
        let id = MessageId(inner.next_message_id);
        inner.next_message_id += 1;
        id
    }

    fn record(&self, message: SentMessage) {
        self.inner.lock().unwrap().sent.push(message);
    }
}

impl Default for RecordingChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagingChannel for RecordingChannel {
    async fn send_text(&self, user: UserId, text: &str) -> Result<MessageId, ChannelError> {
        self.check("send_text")?;
        let message = self.next_message();
        self.record(SentMessage::UserText {
            user,
            text: text.to_string(),
        });
        Ok(message)
    }

    async fn send_chat_text(
        &self,
        chat: ChatId,
        topic: Option<TopicId>,
        text: &str,
    ) -> Result<MessageId, ChannelError> {
        self.check("send_chat_text")?;
        let message = self.next_message();
        self.record(SentMessage::ChatText {
            chat,
            topic,
            text: text.to_string(),
        });
        Ok(message)
    }

    async fn send_photo(
        &self,
        chat: ChatId,
        topic: Option<TopicId>,
        photo: &PhotoRef,
        caption: &str,
    ) -> Result<MessageLocation, ChannelError> {
        self.check("send_photo")?;
        let message = self.next_message();
        self.record(SentMessage::Photo {
            chat,
            topic,
            photo: photo.clone(),
            caption: caption.to_string(),
            message,
        });
        Ok(MessageLocation { chat, message })
    }

    async fn create_topic(&self, chat: ChatId, name: &str) -> Result<TopicId, ChannelError> {
        self.check("create_topic")?;
        let topic = {
            let mut inner = self.inner.lock().unwrap();
            let id = TopicId(inner.next_topic_id);
            inner.next_topic_id += 1;
            id
        };
        self.record(SentMessage::TopicCreated {
            chat,
            name: name.to_string(),
            topic,
        });
        Ok(topic)
    }

    async fn send_decision_controls(
        &self,
        chat: ChatId,
        topic: Option<TopicId>,
        post: PostId,
        _text: &str,
    ) -> Result<MessageLocation, ChannelError> {
        self.check("send_decision_controls")?;
        let message = self.next_message();
        self.record(SentMessage::Controls {
            chat,
            topic,
            post,
            message,
        });
        Ok(MessageLocation { chat, message })
    }

    async fn clear_controls(
        &self,
        location: MessageLocation,
        text: &str,
    ) -> Result<(), ChannelError> {
        self.check("clear_controls")?;
        self.record(SentMessage::ControlsCleared {
            location,
            text: text.to_string(),
        });
        Ok(())
    }
}
