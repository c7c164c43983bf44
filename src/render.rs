//! Outbound message body formatting.
//!
//! All caption/notice bodies are produced here so the lifecycle and
//! conversation code never concatenate display strings inline.

use crate::store::PostRecord;
use crate::types::{PostId, UserId};

/// Display name used for anonymous publications.
pub const ANONYMOUS_DISPLAY_NAME: &str = "Anon";

/// Caption attached to a post photo, both in the moderation topic and in the
/// output channel. HTML markup as the transport renders it.
pub fn post_caption(country_emoji: &str, display_name: &str, age: u8, bot_link: &str) -> String {
    format!(
        "{} <b>{}</b>\n\n<b>Age: {}</b>\n\n<b><a href=\"{}\">POST YOUR PHOTO</a></b>",
        country_emoji, display_name, age, bot_link
    )
}

pub fn post_caption_for(post: &PostRecord, bot_link: &str) -> String {
    post_caption(&post.country_emoji, &post.display_name, post.age, bot_link)
}

/// Name of a user's moderation topic.
pub fn topic_name(display_name: &str, user: UserId) -> String {
    format!("{} ({})", display_name, user)
}

/// Divider posted into an existing topic when the same user submits again.
pub fn resubmission_divider(display_name: &str, user: UserId) -> String {
    format!("\u{1F195} New submission from {} ({})", display_name, user)
}

/// Body of the decision-controls message.
pub fn decision_controls_text(post: PostId) -> String {
    format!("Post #{} - Moderation", post)
}

/// Replacement text for the controls message once a verdict is committed.
pub fn decision_banner(post: PostId, published: bool) -> String {
    if published {
        format!("\u{2705} Post #{} published in channel", post)
    } else {
        format!("\u{274C} Post #{} rejected", post)
    }
}

/// Audit note appended to the user's topic after a verdict.
pub fn audit_note(post: PostId, published: bool) -> String {
    if published {
        format!("\u{2705} Post #{} published in channel", post)
    } else {
        format!("\u{274C} Post #{} rejected by moderator", post)
    }
}
