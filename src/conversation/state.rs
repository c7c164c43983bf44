//! Conversation states and the completed draft.
//!
//! Each state carries exactly the fields collected so far, so a draft with a
//! missing field cannot be represented. `Draft` exists only as the output of
//! a completed conversation.

use crate::country::Country;
use crate::types::PhotoRef;

/// Where a user's conversation currently stands.
///
/// The flow is linear: language, photo, age, country, anonymity choice, and
/// a handle prompt that is entered only when the user declines anonymity
/// without a reusable handle on file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationState {
    SelectingLanguage,
    AwaitingPhoto,
    AwaitingAge {
        photo: PhotoRef,
    },
    AwaitingCountry {
        photo: PhotoRef,
        age: u8,
    },
    AwaitingAnonymityChoice {
        photo: PhotoRef,
        age: u8,
        country: Country,
    },
    AwaitingHandle {
        photo: PhotoRef,
        age: u8,
        country: Country,
    },
}

impl ConversationState {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SelectingLanguage => "selecting_language",
            Self::AwaitingPhoto => "awaiting_photo",
            Self::AwaitingAge { .. } => "awaiting_age",
            Self::AwaitingCountry { .. } => "awaiting_country",
            Self::AwaitingAnonymityChoice { .. } => "awaiting_anonymity_choice",
            Self::AwaitingHandle { .. } => "awaiting_handle",
        }
    }
}

/// A fully collected submission, ready to hand to the lifecycle manager.
/// Every field is validated before construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub photo: PhotoRef,
    pub age: u8,
    pub country: String,
    pub country_emoji: String,
    pub is_anonymous: bool,
    pub display_name: String,
}
