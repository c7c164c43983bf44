//! Country input normalization.
//!
//! Maps free-form text or a flag emoji to a canonical country name + emoji.
//! Three input classes, checked in order:
//!
//! 1. A pair of regional-indicator symbols (a flag emoji). These always
//!    resolve: the canonical code stays unresolved and the input is echoed
//!    back uppercased as the display name.
//! 2. An exact, case-insensitive match against the code/name/alias table.
//! 3. A substring match: the input contained anywhere in a table key.

use std::collections::BTreeMap;

/// A resolved country: display name + flag emoji.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Country {
    pub name: String,
    pub emoji: String,
}

/// Lookup table built once at startup.
pub struct CountryCatalog {
    /// Lowercased key -> canonical entry. BTreeMap keeps substring scans
    /// deterministic.
    entries: BTreeMap<String, Country>,
}

/// The canonical code/name/emoji triples.
const COUNTRIES: &[(&str, &str, &str)] = &[
    ("us", "United States", "\u{1F1FA}\u{1F1F8}"),
    ("ru", "Russia", "\u{1F1F7}\u{1F1FA}"),
    ("gb", "United Kingdom", "\u{1F1EC}\u{1F1E7}"),
    ("de", "Germany", "\u{1F1E9}\u{1F1EA}"),
    ("fr", "France", "\u{1F1EB}\u{1F1F7}"),
    ("es", "Spain", "\u{1F1EA}\u{1F1F8}"),
    ("it", "Italy", "\u{1F1EE}\u{1F1F9}"),
    ("cn", "China", "\u{1F1E8}\u{1F1F3}"),
    ("jp", "Japan", "\u{1F1EF}\u{1F1F5}"),
    ("kr", "South Korea", "\u{1F1F0}\u{1F1F7}"),
    ("br", "Brazil", "\u{1F1E7}\u{1F1F7}"),
    ("ca", "Canada", "\u{1F1E8}\u{1F1E6}"),
    ("au", "Australia", "\u{1F1E6}\u{1F1FA}"),
    ("in", "India", "\u{1F1EE}\u{1F1F3}"),
    ("ua", "Ukraine", "\u{1F1FA}\u{1F1E6}"),
    ("pl", "Poland", "\u{1F1F5}\u{1F1F1}"),
    ("tr", "Turkey", "\u{1F1F9}\u{1F1F7}"),
    ("nl", "Netherlands", "\u{1F1F3}\u{1F1F1}"),
    ("se", "Sweden", "\u{1F1F8}\u{1F1EA}"),
    ("no", "Norway", "\u{1F1F3}\u{1F1F4}"),
];

/// Russian-language aliases, keyed to a canonical code.
const RUSSIAN_ALIASES: &[(&str, &str)] = &[
    ("россия", "ru"),
    ("рф", "ru"),
    ("русский", "ru"),
    ("сша", "us"),
    ("америка", "us"),
    ("американский", "us"),
    ("великобритания", "gb"),
    ("англия", "gb"),
    ("английский", "gb"),
    ("британский", "gb"),
    ("германия", "de"),
    ("немецкий", "de"),
    ("франция", "fr"),
    ("французский", "fr"),
    ("испания", "es"),
    ("испанский", "es"),
    ("италия", "it"),
    ("итальянский", "it"),
    ("китай", "cn"),
    ("китайский", "cn"),
    ("япония", "jp"),
    ("японский", "jp"),
    ("корея", "kr"),
    ("корейский", "kr"),
    ("бразилия", "br"),
    ("бразильский", "br"),
    ("канада", "ca"),
    ("канадский", "ca"),
    ("австралия", "au"),
    ("австралийский", "au"),
    ("индия", "in"),
    ("индийский", "in"),
    ("украина", "ua"),
    ("украинский", "ua"),
    ("польша", "pl"),
    ("польский", "pl"),
    ("турция", "tr"),
    ("турецкий", "tr"),
    ("нидерланды", "nl"),
    ("голландия", "nl"),
    ("голландский", "nl"),
    ("швеция", "se"),
    ("шведский", "se"),
    ("норвегия", "no"),
    ("норвежский", "no"),
];

/// Returns true if the input is exactly two regional-indicator symbols,
/// i.e. a flag emoji.
fn is_flag_pair(text: &str) -> bool {
    let mut chars = text.chars();
    let in_range =
        |c: char| ('\u{1F1E6}'..='\u{1F1FF}').contains(&c);
    matches!(
        (chars.next(), chars.next(), chars.next()),
        (Some(a), Some(b), None) if in_range(a) && in_range(b)
    )
}

impl CountryCatalog {
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        let mut by_code: BTreeMap<&str, Country> = BTreeMap::new();

        for (code, name, emoji) in COUNTRIES {
            let country = Country {
                name: name.to_string(),
                emoji: emoji.to_string(),
            };
            by_code.insert(code, country.clone());
            entries.insert(code.to_string(), country.clone());
            entries.insert(name.to_lowercase(), country);
        }
        for (alias, code) in RUSSIAN_ALIASES {
            if let Some(country) = by_code.get(code) {
                entries.insert(alias.to_string(), country.clone());
            }
        }

        Self { entries }
    }

    /// Resolve free-form input to a country, or None if nothing matches.
    ///
    /// Flag emoji input never fails to resolve; the emoji itself is kept and
    /// the display name is the input uppercased (regional-indicator symbols
    /// have no lowercase forms, so this is an identity echo).
    pub fn resolve(&self, input: &str) -> Option<Country> {
        let input = input.trim().to_lowercase();
        if input.is_empty() {
            return None;
        }

        if is_flag_pair(&input) {
            return Some(Country {
                name: input.to_uppercase(),
                emoji: input,
            });
        }

        if let Some(country) = self.entries.get(&input) {
            return Some(country.clone());
        }

        // Substring fallback: "united" matches "united states".
        self.entries
            .iter()
            .find(|(key, _)| key.contains(&input))
            .map(|(_, country)| country.clone())
    }
}

impl Default for CountryCatalog {
    fn default() -> Self {
        Self::new()
    }
}
