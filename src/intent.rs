//! Free-text intent parsing for the anonymity choice and handle input.
//!
//! Kept out of the state machine so the keyword tables can be tested and
//! swapped independently of transition logic.

/// Keywords meaning "publish anonymously". Both alphabets are accepted
/// regardless of the user's language since users mix them freely.
const ANON_KEYWORDS: &[&str] = &["анон", "анонимно", "anon", "anonymous"];

/// Keywords meaning "publish with my name". Checked before the bare set:
/// with containment matching, "not anon" contains "anon" and would otherwise
/// be misread as an anonymous choice.
const NOT_ANON_KEYWORDS: &[&str] = &[
    "не анон",
    "не анонимно",
    "не anon",
    "not anon",
    "not anonymous",
];

/// Parse an anonymity choice from free text.
///
/// Returns `Some(true)` for anonymous, `Some(false)` for named publication,
/// `None` when no keyword is recognized (caller re-prompts).
pub fn parse_anonymity(input: &str) -> Option<bool> {
    let input = input.trim().to_lowercase();

    for keyword in NOT_ANON_KEYWORDS {
        if input.contains(keyword) {
            return Some(false);
        }
    }
    for keyword in ANON_KEYWORDS {
        if input.contains(keyword) {
            return Some(true);
        }
    }
    None
}

/// Validate a user-supplied handle: a leading `@` followed by at least one
/// character.
pub fn is_valid_handle(input: &str) -> bool {
    let input = input.trim();
    input.starts_with('@') && input.len() > 1
}
