//! Inbound user events.

use crate::localization::Language;
use crate::types::PhotoRef;

/// One event from the submitting user, already stripped of transport detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserEvent {
    /// First contact or an explicit restart. Carries the profile fields the
    /// transport knows about the sender.
    Start {
        handle: Option<String>,
        display_name: String,
    },
    /// A language selector button press.
    LanguageSelected(Language),
    /// The language command; re-shows the selector in any state.
    LanguageCommand,
    Text(String),
    Photo(PhotoRef),
    Cancel,
}

impl UserEvent {
    /// Event kind for logging. Text payloads are not included.
    pub fn log_summary(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::LanguageSelected(_) => "language_selected",
            Self::LanguageCommand => "language_command",
            Self::Text(_) => "text",
            Self::Photo(_) => "photo",
            Self::Cancel => "cancel",
        }
    }
}
