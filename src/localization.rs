//! User-facing text tables.
//!
//! Every outbound prompt is keyed by a `TextKey` and resolved against the
//! submitter's stored language. The tables carry the full set of texts the
//! conversation and moderation flows produce; adding a language means adding
//! one match arm per key.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported interface languages. `En` is the default assigned at first
/// contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Ru,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ru => "ru",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "en" => Some(Self::En),
            "ru" => Some(Self::Ru),
            _ => None,
        }
    }

    /// Human-readable label with flag, as shown on the language selector.
    pub fn label(&self) -> &'static str {
        match self {
            Self::En => "English \u{1F1FA}\u{1F1F8}",
            Self::Ru => "Русский \u{1F1F7}\u{1F1FA}",
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Self::En
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keys for every localized text the engine sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKey {
    SelectLanguage,
    LanguageSet,
    LanguageChanged,
    SendPhoto,
    InvalidAge,
    AgeLimits,
    EnterCountry,
    CountryClarification,
    SelectMode,
    NoHandle,
    EnterHandle,
    InvalidHandle,
    Submitted,
    SubmitError,
    Cancelled,
    PostApproved,
    PostRejected,
}

/// Greeting sent on first contact. The only text with interpolation, so it
/// lives outside the static tables.
pub fn welcome(lang: Language, name: &str) -> String {
    match lang {
        Language::En => format!(
            "Hello {}! \u{1F44B}\nI'm a photo submission bot. Please select your language:",
            name
        ),
        Language::Ru => format!(
            "Привет, {}! \u{1F44B}\nЯ бот для отправки фото. Пожалуйста, выберите язык:",
            name
        ),
    }
}

/// Resolve a text key for a language.
pub fn text(lang: Language, key: TextKey) -> &'static str {
    match lang {
        Language::En => match key {
            TextKey::SelectLanguage => "Please select your language:",
            TextKey::LanguageSet => {
                "Language set to English. You can change it with /language command.\n\n\
                 Now send me a photo to start."
            }
            TextKey::LanguageChanged => "Language changed to English.",
            TextKey::SendPhoto => "\u{1F4F8} Photo received! Now send your age (numbers only):",
            TextKey::InvalidAge => "Please send age as numbers:",
            TextKey::AgeLimits => "Age must be between 18 and 100 years. Try again:",
            TextKey::EnterCountry => {
                "Now enter your country:\nYou can send:\n\
                 \u{2022} Flag emoji (\u{1F1FA}\u{1F1F8}, \u{1F1F7}\u{1F1FA})\n\
                 \u{2022} Country name (USA, Russia)\n\
                 \u{2022} 2-letter code (us, ru)"
            }
            TextKey::CountryClarification => {
                "Please clarify the country:\n\
                 1. Send flag emoji (\u{1F1FA}\u{1F1F8}, \u{1F1F7}\u{1F1FA} etc.)\n\
                 2. Write full name (United States, Россия)\n\
                 3. Use 2-letter code (us, ru, gb)"
            }
            TextKey::SelectMode => "Select publication mode:\nSend: 'anon' or 'not anon'",
            TextKey::NoHandle => {
                "You don't have a username (@nickname) set in your profile.\n\n\
                 To post non-anonymously, you need to set a username.\n\nOptions:\n\
                 1. Provide a username (with @)\n\
                 2. Post anonymously (send 'anon')"
            }
            TextKey::EnterHandle => "Please enter your username (with @, e.g., @username):",
            TextKey::InvalidHandle => {
                "Username should start with @. Please enter a valid username \
                 or send 'anon' to post anonymously:"
            }
            TextKey::Submitted => {
                "\u{2705} Your post has been submitted for moderation! \
                 We will notify you of the result."
            }
            TextKey::SubmitError => {
                "\u{274C} An error occurred while creating the post. Please try later."
            }
            TextKey::Cancelled => "Action cancelled. Send a photo to start over.",
            TextKey::PostApproved => "\u{2705} Your post has been approved and published!",
            TextKey::PostRejected => "\u{274C} Your post has been rejected by moderators.",
        },
        Language::Ru => match key {
            TextKey::SelectLanguage => "Пожалуйста, выберите язык:",
            TextKey::LanguageSet => {
                "Язык изменен на Русский. Вы можете изменить его командой /language.\n\n\
                 Теперь отправьте мне фото, чтобы начать."
            }
            TextKey::LanguageChanged => "Язык изменен на Русский.",
            TextKey::SendPhoto => {
                "\u{1F4F8} Фото получено! Теперь отправьте ваш возраст (только цифры):"
            }
            TextKey::InvalidAge => "Пожалуйста, отправьте возраст цифрами:",
            TextKey::AgeLimits => "Возраст должен быть от 18 до 100 лет. Попробуйте еще раз:",
            TextKey::EnterCountry => {
                "Теперь укажите вашу страну:\nМожно отправить:\n\
                 \u{2022} Эмодзи флага (\u{1F1FA}\u{1F1F8}, \u{1F1F7}\u{1F1FA})\n\
                 \u{2022} Название страны (USA, Russia)\n\
                 \u{2022} 2-буквенный код (us, ru)"
            }
            TextKey::CountryClarification => {
                "Пожалуйста, уточните страну:\n\
                 1. Отправьте эмодзи флага (\u{1F1FA}\u{1F1F8}, \u{1F1F7}\u{1F1FA} и т.д.)\n\
                 2. Напишите полное название (United States, Россия)\n\
                 3. Используйте 2-буквенный код (us, ru, gb)"
            }
            TextKey::SelectMode => "Выберите режим публикации:\nНапишите: 'анон' или 'не анон'",
            TextKey::NoHandle => {
                "У вас не установлен username (@никнейм).\n\n\
                 Для публикации не анонимно нужно указать username.\n\nВарианты:\n\
                 1. Укажите username (с @)\n\
                 2. Опубликуйте анонимно (отправьте 'анон')"
            }
            TextKey::EnterHandle => {
                "Пожалуйста, введите ваш username (с @, например, @username):"
            }
            TextKey::InvalidHandle => {
                "Username должен начинаться с @. Пожалуйста, введите правильный \
                 username или отправьте 'анон' для анонимной публикации:"
            }
            TextKey::Submitted => {
                "\u{2705} Ваш пост отправлен на модерацию! Мы уведомим вас о результате."
            }
            TextKey::SubmitError => {
                "\u{274C} Произошла ошибка при создании поста. Попробуйте позже."
            }
            TextKey::Cancelled => "Действие отменено. Отправьте фото чтобы начать заново.",
            TextKey::PostApproved => "\u{2705} Ваш пост одобрен и опубликован!",
            TextKey::PostRejected => "\u{274C} Ваш пост отклонен модераторами.",
        },
    }
}
