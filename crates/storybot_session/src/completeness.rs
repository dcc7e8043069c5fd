//! Keyword heuristic deciding whether a character description needs a
//! follow-up question.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// Part of a character description the heuristic looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Aspect {
    /// How the character looks
    Appearance,
    /// How the character behaves
    Personality,
}

/// Vocabulary signalling each aspect. Matching is case-insensitive.
///
/// Non-ASCII entries match anywhere, so stems such as "дружелюб" cover
/// inflected forms. ASCII entries must start a word and may only be followed
/// by a common English ending, so "kind" matches "kindness" but not
/// "kindergarten".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct KeywordTable {
    appearance: Vec<String>,
    personality: Vec<String>,
}

impl KeywordTable {
    /// Creates a table from explicit word lists.
    pub fn new(appearance: Vec<String>, personality: Vec<String>) -> Self {
        Self {
            appearance,
            personality,
        }
    }

    /// Keywords for one aspect.
    pub fn keywords(&self, aspect: Aspect) -> &[String] {
        match aspect {
            Aspect::Appearance => &self.appearance,
            Aspect::Personality => &self.personality,
        }
    }
}

const APPEARANCE_WORDS: &[&str] = &[
    "внешность",
    "выглядит",
    "цвет",
    "размер",
    "рост",
    "глаза",
    "волосы",
    "шерсть",
    "большой",
    "маленький",
    "рыжий",
    "белый",
    "черный",
    "appearance",
    "looks",
    "colour",
    "color",
    "size",
    "tall",
    "eyes",
    "hair",
    "fur",
    "big",
    "small",
    "tiny",
    "ginger",
    "white",
    "black",
    "wears",
];

const PERSONALITY_WORDS: &[&str] = &[
    "характер",
    "любит",
    "добрый",
    "смелый",
    "веселый",
    "умный",
    "дружелюб",
    "храбрый",
    "озорной",
    "personality",
    "loves",
    "likes",
    "kind",
    "brave",
    "cheerful",
    "clever",
    "smart",
    "friendly",
    "mischievous",
    "shy",
    "curious",
    "funny",
];

impl Default for KeywordTable {
    fn default() -> Self {
        Self {
            appearance: APPEARANCE_WORDS.iter().map(|w| w.to_string()).collect(),
            personality: PERSONALITY_WORDS.iter().map(|w| w.to_string()).collect(),
        }
    }
}

/// Result of [`check_completeness`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completeness {
    /// Aspects with no matching keyword, in [`Aspect`] order
    pub missing: Vec<Aspect>,
}

impl Completeness {
    /// Whether every aspect is covered.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Checks which aspects a description covers.
pub fn check_completeness(table: &KeywordTable, description: &str) -> Completeness {
    let text = description.to_lowercase();
    let missing = [Aspect::Appearance, Aspect::Personality]
        .into_iter()
        .filter(|aspect| {
            !table
                .keywords(*aspect)
                .iter()
                .any(|word| !word.is_empty() && mentions(&text, &word.to_lowercase()))
        })
        .collect();
    Completeness { missing }
}

const ENGLISH_ENDINGS: &[&str] = &[
    "", "s", "es", "y", "ly", "er", "ers", "est", "ed", "ing", "ness", "ful",
];

fn mentions(text: &str, keyword: &str) -> bool {
    if !keyword.is_ascii() {
        return text.contains(keyword);
    }

    text.match_indices(keyword).any(|(start, _)| {
        let at_word_start = text[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());
        let tail = &text[start + keyword.len()..];
        let end = tail
            .find(|c: char| !c.is_alphanumeric())
            .unwrap_or(tail.len());
        at_word_start && is_english_ending(keyword, &tail[..end])
    })
}

// Accepts a doubled final consonant too: "big" -> "bigger", "fur" -> "furry".
fn is_english_ending(keyword: &str, ending: &str) -> bool {
    if ENGLISH_ENDINGS.contains(&ending) {
        return true;
    }
    keyword
        .chars()
        .next_back()
        .and_then(|last| ending.strip_prefix(last))
        .is_some_and(|rest| !rest.is_empty() && ENGLISH_ENDINGS.contains(&rest))
}

/// Follow-up question naming exactly the missing aspects.
pub fn clarification_question(name: &str, missing: &[Aspect]) -> String {
    let aspects = missing
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(" and ");
    format!(
        "Tell me a little more about {}'s {} so I can draw them consistently.",
        name, aspects
    )
}
