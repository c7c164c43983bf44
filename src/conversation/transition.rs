//! The pure transition function.
//!
//! `transition` never touches the store or the channel: it returns the next
//! step plus a list of effects for the engine to execute. Invalid input
//! re-prompts and stays in state; only valid input advances.

use crate::country::CountryCatalog;
use crate::intent::{is_valid_handle, parse_anonymity};
use crate::localization::{Language, TextKey};
use crate::render::ANONYMOUS_DISPLAY_NAME;
use crate::types::PhotoRef;

use super::state::{ConversationState, Draft};
use super::UserEvent;

/// Read-only context the transition needs beyond state + event.
pub struct TransitionContext<'a> {
    /// The user's handle on file, if any. Reused as the display name when the
    /// user declines anonymity.
    pub handle: Option<&'a str>,
    pub catalog: &'a CountryCatalog,
}

/// A side effect for the engine to execute after the transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send the localized text to the user.
    Prompt(TextKey),
    /// Send the greeting with the user's display name, which also carries
    /// the language selector.
    Welcome,
    /// Persist a language change for the user.
    SetLanguage(Language),
}

/// What happened to the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// State unchanged (invalid input, ignored input, or a side channel).
    Stay,
    Advance(ConversationState),
    /// The draft is complete; the session ends and the draft goes to the
    /// lifecycle manager.
    Finished(Draft),
    /// The user cancelled; the session ends with no draft.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionResult {
    pub step: Step,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    fn stay(effects: Vec<Effect>) -> Self {
        Self {
            step: Step::Stay,
            effects,
        }
    }

    fn advance(state: ConversationState, effects: Vec<Effect>) -> Self {
        Self {
            step: Step::Advance(state),
            effects,
        }
    }

    fn finished(draft: Draft) -> Self {
        Self {
            step: Step::Finished(draft),
            effects: Vec::new(),
        }
    }
}

/// Apply one event to a conversation state.
pub fn transition(
    state: &ConversationState,
    event: UserEvent,
    ctx: &TransitionContext<'_>,
) -> TransitionResult {
    // State-independent side channels come first: they behave the same way
    // everywhere and never disturb the collected fields.
    match event {
        UserEvent::Start { .. } => {
            return TransitionResult::advance(
                ConversationState::SelectingLanguage,
                vec![Effect::Welcome],
            );
        }
        UserEvent::Cancel => {
            return TransitionResult {
                step: Step::Cancelled,
                effects: vec![Effect::Prompt(TextKey::Cancelled)],
            };
        }
        UserEvent::LanguageCommand => {
            return TransitionResult::stay(vec![Effect::Prompt(TextKey::SelectLanguage)]);
        }
        UserEvent::LanguageSelected(lang) => {
            return match state {
                ConversationState::SelectingLanguage => TransitionResult::advance(
                    ConversationState::AwaitingPhoto,
                    vec![
                        Effect::SetLanguage(lang),
                        Effect::Prompt(TextKey::LanguageSet),
                    ],
                ),
                // Mid-conversation language switch keeps the state and draft.
                _ => TransitionResult::stay(vec![
                    Effect::SetLanguage(lang),
                    Effect::Prompt(TextKey::LanguageChanged),
                ]),
            };
        }
        UserEvent::Text(_) | UserEvent::Photo(_) => {}
    }

    match state {
        ConversationState::SelectingLanguage => {
            TransitionResult::stay(vec![Effect::Prompt(TextKey::SelectLanguage)])
        }

        ConversationState::AwaitingPhoto => match event {
            UserEvent::Photo(photo) => TransitionResult::advance(
                ConversationState::AwaitingAge { photo },
                vec![Effect::Prompt(TextKey::SendPhoto)],
            ),
            _ => TransitionResult::stay(Vec::new()),
        },

        ConversationState::AwaitingAge { photo } => match event {
            UserEvent::Text(text) => on_age_input(&text, photo),
            _ => TransitionResult::stay(Vec::new()),
        },

        ConversationState::AwaitingCountry { photo, age } => match event {
            UserEvent::Text(text) => match ctx.catalog.resolve(&text) {
                Some(country) => TransitionResult::advance(
                    ConversationState::AwaitingAnonymityChoice {
                        photo: photo.clone(),
                        age: *age,
                        country,
                    },
                    vec![Effect::Prompt(TextKey::SelectMode)],
                ),
                None => {
                    TransitionResult::stay(vec![Effect::Prompt(TextKey::CountryClarification)])
                }
            },
            _ => TransitionResult::stay(Vec::new()),
        },

        ConversationState::AwaitingAnonymityChoice {
            photo,
            age,
            country,
        } => match event {
            UserEvent::Text(text) => match parse_anonymity(&text) {
                Some(true) => TransitionResult::finished(Draft {
                    photo: photo.clone(),
                    age: *age,
                    country: country.name.clone(),
                    country_emoji: country.emoji.clone(),
                    is_anonymous: true,
                    display_name: ANONYMOUS_DISPLAY_NAME.to_string(),
                }),
                Some(false) => match reusable_handle(ctx) {
                    Some(handle) => TransitionResult::finished(Draft {
                        photo: photo.clone(),
                        age: *age,
                        country: country.name.clone(),
                        country_emoji: country.emoji.clone(),
                        is_anonymous: false,
                        display_name: handle.to_string(),
                    }),
                    None => TransitionResult::advance(
                        ConversationState::AwaitingHandle {
                            photo: photo.clone(),
                            age: *age,
                            country: country.clone(),
                        },
                        vec![Effect::Prompt(TextKey::NoHandle)],
                    ),
                },
                None => TransitionResult::stay(vec![Effect::Prompt(TextKey::SelectMode)]),
            },
            _ => TransitionResult::stay(Vec::new()),
        },

        ConversationState::AwaitingHandle {
            photo,
            age,
            country,
        } => match event {
            UserEvent::Text(text) => {
                // The user may restate their choice at the handle prompt:
                // anonymous intent completes the draft, a repeated
                // "not anonymous" just re-asks for the handle.
                match parse_anonymity(&text) {
                    Some(true) => {
                        return TransitionResult::finished(Draft {
                            photo: photo.clone(),
                            age: *age,
                            country: country.name.clone(),
                            country_emoji: country.emoji.clone(),
                            is_anonymous: true,
                            display_name: ANONYMOUS_DISPLAY_NAME.to_string(),
                        });
                    }
                    Some(false) => {
                        return TransitionResult::stay(vec![Effect::Prompt(
                            TextKey::EnterHandle,
                        )]);
                    }
                    None => {}
                }
                if is_valid_handle(&text) {
                    TransitionResult::finished(Draft {
                        photo: photo.clone(),
                        age: *age,
                        country: country.name.clone(),
                        country_emoji: country.emoji.clone(),
                        is_anonymous: false,
                        display_name: text.trim().to_string(),
                    })
                } else {
                    TransitionResult::stay(vec![Effect::Prompt(TextKey::InvalidHandle)])
                }
            }
            _ => TransitionResult::stay(Vec::new()),
        },
    }
}

fn on_age_input(text: &str, photo: &PhotoRef) -> TransitionResult {
    let text = text.trim();
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return TransitionResult::stay(vec![Effect::Prompt(TextKey::InvalidAge)]);
    }
    match text.parse::<u32>() {
        Ok(age @ 18..=100) => TransitionResult::advance(
            ConversationState::AwaitingCountry {
                photo: photo.clone(),
                age: age as u8,
            },
            vec![Effect::Prompt(TextKey::EnterCountry)],
        ),
        // Digits, but outside the accepted range (or overflowing).
        _ => TransitionResult::stay(vec![Effect::Prompt(TextKey::AgeLimits)]),
    }
}

fn reusable_handle<'a>(ctx: &TransitionContext<'a>) -> Option<&'a str> {
    ctx.handle.filter(|h| is_valid_handle(h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::country::Country;

    fn ctx<'a>(catalog: &'a CountryCatalog, handle: Option<&'a str>) -> TransitionContext<'a> {
        TransitionContext { handle, catalog }
    }

    fn awaiting_age() -> ConversationState {
        ConversationState::AwaitingAge {
            photo: "photo-1".into(),
        }
    }

    fn awaiting_anonymity() -> ConversationState {
        ConversationState::AwaitingAnonymityChoice {
            photo: "photo-1".into(),
            age: 45,
            country: Country {
                name: "Japan".to_string(),
                emoji: "\u{1F1EF}\u{1F1F5}".to_string(),
            },
        }
    }

    fn text(s: &str) -> UserEvent {
        UserEvent::Text(s.to_string())
    }

    #[test]
    fn test_language_selection_advances_to_photo() {
        let catalog = CountryCatalog::new();
        let result = transition(
            &ConversationState::SelectingLanguage,
            UserEvent::LanguageSelected(Language::Ru),
            &ctx(&catalog, None),
        );
        assert_eq!(result.step, Step::Advance(ConversationState::AwaitingPhoto));
        assert_eq!(
            result.effects,
            vec![
                Effect::SetLanguage(Language::Ru),
                Effect::Prompt(TextKey::LanguageSet),
            ]
        );
    }

    #[test]
    fn test_text_while_selecting_language_reprompts() {
        let catalog = CountryCatalog::new();
        let result = transition(
            &ConversationState::SelectingLanguage,
            text("hello"),
            &ctx(&catalog, None),
        );
        assert_eq!(result.step, Step::Stay);
        assert_eq!(result.effects, vec![Effect::Prompt(TextKey::SelectLanguage)]);
    }

    #[test]
    fn test_photo_advances_to_age() {
        let catalog = CountryCatalog::new();
        let result = transition(
            &ConversationState::AwaitingPhoto,
            UserEvent::Photo("photo-1".into()),
            &ctx(&catalog, None),
        );
        assert_eq!(
            result.step,
            Step::Advance(ConversationState::AwaitingAge {
                photo: "photo-1".into()
            })
        );
    }

    #[test]
    fn test_text_while_awaiting_photo_is_ignored() {
        let catalog = CountryCatalog::new();
        let result = transition(
            &ConversationState::AwaitingPhoto,
            text("here you go"),
            &ctx(&catalog, None),
        );
        assert_eq!(result.step, Step::Stay);
        assert!(result.effects.is_empty());
    }

    #[test]
    fn test_age_rejects_non_digits() {
        let catalog = CountryCatalog::new();
        for input in ["abc", "18yo", "-20", "4 5", ""] {
            let result = transition(&awaiting_age(), text(input), &ctx(&catalog, None));
            assert_eq!(result.step, Step::Stay, "input {:?}", input);
            assert_eq!(result.effects, vec![Effect::Prompt(TextKey::InvalidAge)]);
        }
    }

    #[test]
    fn test_age_rejects_out_of_range() {
        let catalog = CountryCatalog::new();
        for input in ["17", "101", "999999999999999999999"] {
            let result = transition(&awaiting_age(), text(input), &ctx(&catalog, None));
            assert_eq!(result.step, Step::Stay, "input {:?}", input);
            assert_eq!(result.effects, vec![Effect::Prompt(TextKey::AgeLimits)]);
        }
    }

    #[test]
    fn test_age_boundaries_accepted() {
        let catalog = CountryCatalog::new();
        for input in ["18", "45", "100"] {
            let result = transition(&awaiting_age(), text(input), &ctx(&catalog, None));
            assert!(
                matches!(result.step, Step::Advance(ConversationState::AwaitingCountry { .. })),
                "input {:?}",
                input
            );
        }
    }

    #[test]
    fn test_unknown_country_reprompts() {
        let catalog = CountryCatalog::new();
        let state = ConversationState::AwaitingCountry {
            photo: "photo-1".into(),
            age: 45,
        };
        let result = transition(&state, text("atlantis"), &ctx(&catalog, None));
        assert_eq!(result.step, Step::Stay);
        assert_eq!(
            result.effects,
            vec![Effect::Prompt(TextKey::CountryClarification)]
        );
    }

    #[test]
    fn test_country_match_advances() {
        let catalog = CountryCatalog::new();
        let state = ConversationState::AwaitingCountry {
            photo: "photo-1".into(),
            age: 45,
        };
        let result = transition(&state, text("japan"), &ctx(&catalog, None));
        let Step::Advance(ConversationState::AwaitingAnonymityChoice { country, .. }) =
            result.step
        else {
            panic!("expected advance to anonymity choice");
        };
        assert_eq!(country.name, "Japan");
    }

    #[test]
    fn test_anonymous_choice_completes_with_placeholder() {
        let catalog = CountryCatalog::new();
        // A handle on file must not leak into an anonymous post.
        let result = transition(&awaiting_anonymity(), text("anon"), &ctx(&catalog, Some("@bob")));
        let Step::Finished(draft) = result.step else {
            panic!("expected finished draft");
        };
        assert!(draft.is_anonymous);
        assert_eq!(draft.display_name, ANONYMOUS_DISPLAY_NAME);
    }

    #[test]
    fn test_named_choice_reuses_handle() {
        let catalog = CountryCatalog::new();
        let result = transition(
            &awaiting_anonymity(),
            text("not anon"),
            &ctx(&catalog, Some("@bob")),
        );
        let Step::Finished(draft) = result.step else {
            panic!("expected finished draft");
        };
        assert!(!draft.is_anonymous);
        assert_eq!(draft.display_name, "@bob");
    }

    #[test]
    fn test_named_choice_without_handle_prompts_for_one() {
        let catalog = CountryCatalog::new();
        let result = transition(&awaiting_anonymity(), text("not anon"), &ctx(&catalog, None));
        assert!(matches!(
            result.step,
            Step::Advance(ConversationState::AwaitingHandle { .. })
        ));
        assert_eq!(result.effects, vec![Effect::Prompt(TextKey::NoHandle)]);
    }

    #[test]
    fn test_unrecognized_anonymity_input_reprompts() {
        let catalog = CountryCatalog::new();
        let result = transition(&awaiting_anonymity(), text("maybe"), &ctx(&catalog, None));
        assert_eq!(result.step, Step::Stay);
        assert_eq!(result.effects, vec![Effect::Prompt(TextKey::SelectMode)]);
    }

    /// No handle on file, "not anonymous" chosen: a bare name is rejected
    /// and "@bob" completes the draft with that display name.
    #[test]
    fn test_handle_prompt_flow() {
        let catalog = CountryCatalog::new();
        let c = ctx(&catalog, None);

        let result = transition(&awaiting_anonymity(), text("not anon"), &c);
        let Step::Advance(state) = result.step else {
            panic!("expected advance to handle prompt");
        };

        let rejected = transition(&state, text("bob"), &c);
        assert_eq!(rejected.step, Step::Stay);
        assert_eq!(
            rejected.effects,
            vec![Effect::Prompt(TextKey::InvalidHandle)]
        );

        let accepted = transition(&state, text("@bob"), &c);
        let Step::Finished(draft) = accepted.step else {
            panic!("expected finished draft");
        };
        assert_eq!(draft.display_name, "@bob");
        assert!(!draft.is_anonymous);
    }

    #[test]
    fn test_handle_prompt_accepts_late_anonymity() {
        let catalog = CountryCatalog::new();
        let state = ConversationState::AwaitingHandle {
            photo: "photo-1".into(),
            age: 45,
            country: Country {
                name: "Japan".to_string(),
                emoji: "\u{1F1EF}\u{1F1F5}".to_string(),
            },
        };
        let result = transition(&state, text("anon"), &ctx(&catalog, None));
        let Step::Finished(draft) = result.step else {
            panic!("expected finished draft");
        };
        assert!(draft.is_anonymous);
        assert_eq!(draft.display_name, ANONYMOUS_DISPLAY_NAME);
    }

    #[test]
    fn test_language_switch_mid_conversation_keeps_state() {
        let catalog = CountryCatalog::new();
        let result = transition(
            &awaiting_age(),
            UserEvent::LanguageSelected(Language::Ru),
            &ctx(&catalog, None),
        );
        assert_eq!(result.step, Step::Stay);
        assert_eq!(
            result.effects,
            vec![
                Effect::SetLanguage(Language::Ru),
                Effect::Prompt(TextKey::LanguageChanged),
            ]
        );
    }

    #[test]
    fn test_language_command_works_in_any_state() {
        let catalog = CountryCatalog::new();
        for state in [
            ConversationState::SelectingLanguage,
            ConversationState::AwaitingPhoto,
            awaiting_age(),
            awaiting_anonymity(),
        ] {
            let result = transition(&state, UserEvent::LanguageCommand, &ctx(&catalog, None));
            assert_eq!(result.step, Step::Stay, "state {}", state.name());
            assert_eq!(
                result.effects,
                vec![Effect::Prompt(TextKey::SelectLanguage)]
            );
        }
    }

    #[test]
    fn test_cancel_discards_from_any_state() {
        let catalog = CountryCatalog::new();
        for state in [ConversationState::AwaitingPhoto, awaiting_anonymity()] {
            let result = transition(&state, UserEvent::Cancel, &ctx(&catalog, None));
            assert_eq!(result.step, Step::Cancelled);
            assert_eq!(result.effects, vec![Effect::Prompt(TextKey::Cancelled)]);
        }
    }

    #[test]
    fn test_start_resets_to_language_selection() {
        let catalog = CountryCatalog::new();
        let result = transition(
            &awaiting_age(),
            UserEvent::Start {
                handle: None,
                display_name: "Bob".to_string(),
            },
            &ctx(&catalog, None),
        );
        assert_eq!(
            result.step,
            Step::Advance(ConversationState::SelectingLanguage)
        );
        assert_eq!(result.effects, vec![Effect::Welcome]);
    }

    /// Restating "not anon" at the handle prompt re-asks for the handle; it
    /// is not a malformed handle.
    #[test]
    fn test_repeated_not_anon_at_handle_prompt_reasks_for_handle() {
        let catalog = CountryCatalog::new();
        let state = ConversationState::AwaitingHandle {
            photo: "photo-1".into(),
            age: 45,
            country: Country {
                name: "Japan".to_string(),
                emoji: "\u{1F1EF}\u{1F1F5}".to_string(),
            },
        };
        let result = transition(&state, text("not anon"), &ctx(&catalog, None));
        assert_eq!(result.step, Step::Stay);
        assert_eq!(result.effects, vec![Effect::Prompt(TextKey::EnterHandle)]);
    }
}
