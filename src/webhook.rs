//! Inbound update receiver.
//!
//! The gateway delivers every inbound event as one JSON POST to `/update`.
//! User events are acknowledged once the engine has applied them; decision
//! events answer with the committed outcome so the gateway can show it to
//! the moderator.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use crate::conversation::UserEvent;
use crate::engine::DecisionOutcome;
use crate::localization::Language;
use crate::types::{PostId, UserId, Verdict};
use crate::AppState;

/// One inbound event from the gateway.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InboundUpdate {
    Start {
        user_id: i64,
        handle: Option<String>,
        display_name: String,
    },
    LanguageSelected {
        user_id: i64,
        language: String,
    },
    LanguageCommand {
        user_id: i64,
    },
    Text {
        user_id: i64,
        text: String,
    },
    Photo {
        user_id: i64,
        photo_ref: String,
    },
    Cancel {
        user_id: i64,
    },
    Decision {
        post_id: i64,
        verdict: Verdict,
    },
}

pub fn webhook_router() -> Router<Arc<AppState>> {
    Router::new().route("/update", post(update_handler))
}

async fn update_handler(
    State(state): State<Arc<AppState>>,
    Json(update): Json<InboundUpdate>,
) -> Response {
    match update {
        InboundUpdate::Decision { post_id, verdict } => {
            let outcome = state.engine.handle_decision(PostId(post_id), verdict).await;
            info!(post = post_id, outcome = outcome.as_str(), "decision handled");
            let status = match outcome {
                DecisionOutcome::NotFound => StatusCode::NOT_FOUND,
                DecisionOutcome::Failed => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::OK,
            };
            (status, Json(json!({ "result": outcome.as_str() }))).into_response()
        }
        other => {
            let (user, event) = match to_user_event(other) {
                Ok(pair) => pair,
                Err(detail) => {
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(json!({ "error": detail })),
                    )
                        .into_response();
                }
            };
            match state.engine.handle_user_event(user, event).await {
                Ok(()) => Json(json!({ "result": "ok" })).into_response(),
                Err(e) => {
                    error!(user = %user, error = %e, "failed to process user event");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({ "error": "internal error" })),
                    )
                        .into_response()
                }
            }
        }
    }
}

fn to_user_event(update: InboundUpdate) -> Result<(UserId, UserEvent), String> {
    match update {
        InboundUpdate::Start {
            user_id,
            handle,
            display_name,
        } => Ok((
            UserId(user_id),
            UserEvent::Start {
                handle,
                display_name,
            },
        )),
        InboundUpdate::LanguageSelected { user_id, language } => {
            let language = Language::parse(&language)
                .ok_or_else(|| format!("unsupported language '{}'", language))?;
            Ok((UserId(user_id), UserEvent::LanguageSelected(language)))
        }
        InboundUpdate::LanguageCommand { user_id } => {
            Ok((UserId(user_id), UserEvent::LanguageCommand))
        }
        InboundUpdate::Text { user_id, text } => Ok((UserId(user_id), UserEvent::Text(text))),
        InboundUpdate::Photo { user_id, photo_ref } => {
            Ok((UserId(user_id), UserEvent::Photo(photo_ref.into())))
        }
        InboundUpdate::Cancel { user_id } => Ok((UserId(user_id), UserEvent::Cancel)),
        InboundUpdate::Decision { .. } => Err("decision is not a user event".to_string()),
    }
}
