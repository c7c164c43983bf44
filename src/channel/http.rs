//! HTTP gateway binding of `MessagingChannel`.
//!
//! The gateway is a thin bridge to the actual messaging transport; every
//! operation is one JSON POST. A non-2xx answer carries an error description
//! in the body and maps to `ChannelError::Rejected`.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

use crate::types::{ChatId, MessageId, MessageLocation, PhotoRef, PostId, TopicId, UserId};

use super::{ChannelError, MessagingChannel};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpChannel {
    client: reqwest::Client,
    base_url: String,
}

impl HttpChannel {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ChannelError::transport("build client", e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post<Req, Resp>(
        &self,
        operation: &'static str,
        path: &str,
        body: &Req,
    ) -> Result<Resp, ChannelError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::transport(operation, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ChannelError::rejected(
                operation,
                format!("{}: {}", status, detail),
            ));
        }
        response
            .json()
            .await
            .map_err(|e| ChannelError::transport(operation, e.to_string()))
    }
}

#[derive(Serialize)]
struct SendTextRequest<'a> {
    user_id: i64,
    text: &'a str,
}

#[derive(Serialize)]
struct SendChatTextRequest<'a> {
    chat_id: i64,
    topic_id: Option<i64>,
    text: &'a str,
}

#[derive(Serialize)]
struct SendPhotoRequest<'a> {
    chat_id: i64,
    topic_id: Option<i64>,
    photo_ref: &'a str,
    caption: &'a str,
}

#[derive(Serialize)]
struct CreateTopicRequest<'a> {
    chat_id: i64,
    name: &'a str,
}

#[derive(Serialize)]
struct SendControlsRequest<'a> {
    chat_id: i64,
    topic_id: Option<i64>,
    post_id: i64,
    text: &'a str,
}

#[derive(Serialize)]
struct ClearControlsRequest<'a> {
    chat_id: i64,
    message_id: i64,
    text: &'a str,
}

#[derive(Deserialize)]
struct MessageResponse {
    message_id: i64,
}

#[derive(Deserialize)]
struct TopicResponse {
    topic_id: i64,
}

#[derive(Deserialize)]
struct EmptyResponse {}

#[async_trait]
impl MessagingChannel for HttpChannel {
    async fn send_text(&self, user: UserId, text: &str) -> Result<MessageId, ChannelError> {
        let response: MessageResponse = self
            .post(
                "send_text",
                "send_text",
                &SendTextRequest {
                    user_id: user.0,
                    text,
                },
            )
            .await?;
        Ok(MessageId(response.message_id))
    }

    async fn send_chat_text(
        &self,
        chat: ChatId,
        topic: Option<TopicId>,
        text: &str,
    ) -> Result<MessageId, ChannelError> {
        let response: MessageResponse = self
            .post(
                "send_chat_text",
                "send_chat_text",
                &SendChatTextRequest {
                    chat_id: chat.0,
                    topic_id: topic.map(|t| t.0),
                    text,
                },
            )
            .await?;
        Ok(MessageId(response.message_id))
    }

    async fn send_photo(
        &self,
        chat: ChatId,
        topic: Option<TopicId>,
        photo: &PhotoRef,
        caption: &str,
    ) -> Result<MessageLocation, ChannelError> {
        let response: MessageResponse = self
            .post(
                "send_photo",
                "send_photo",
                &SendPhotoRequest {
                    chat_id: chat.0,
                    topic_id: topic.map(|t| t.0),
                    photo_ref: &photo.0,
                    caption,
                },
            )
            .await?;
        Ok(MessageLocation {
            chat,
            message: MessageId(response.message_id),
        })
    }

    async fn create_topic(&self, chat: ChatId, name: &str) -> Result<TopicId, ChannelError> {
        let response: TopicResponse = self
            .post(
                "create_topic",
                "create_topic",
                &CreateTopicRequest {
                    chat_id: chat.0,
                    name,
                },
            )
            .await?;
        Ok(TopicId(response.topic_id))
    }

    async fn send_decision_controls(
        &self,
        chat: ChatId,
        topic: Option<TopicId>,
        post: PostId,
        text: &str,
    ) -> Result<MessageLocation, ChannelError> {
        let response: MessageResponse = self
            .post(
                "send_decision_controls",
                "send_controls",
                &SendControlsRequest {
                    chat_id: chat.0,
                    topic_id: topic.map(|t| t.0),
                    post_id: post.0,
                    text,
                },
            )
            .await?;
        Ok(MessageLocation {
            chat,
            message: MessageId(response.message_id),
        })
    }

    async fn clear_controls(
        &self,
        location: MessageLocation,
        text: &str,
    ) -> Result<(), ChannelError> {
        let _: EmptyResponse = self
            .post(
                "clear_controls",
                "clear_controls",
                &ClearControlsRequest {
                    chat_id: location.chat.0,
                    message_id: location.message.0,
                    text,
                },
            )
            .await?;
        Ok(())
    }
}
