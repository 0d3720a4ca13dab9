//! Recognizers for prompt replies: numbers, closed choices, yes/no and
//! sign-in magic codes.

use std::ops::RangeInclusive;

/// A whole number prompt with an accepted range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NumberPrompt {
    pub prompt: &'static str,
    pub retry: &'static str,
    pub range: RangeInclusive<i64>,
}

impl NumberPrompt {
    /// The recognized value when it is within range.
    pub fn validate(&self, text: &str) -> Option<u32> {
        recognize_number(text)
            .filter(|value| self.range.contains(value))
            .and_then(|value| u32::try_from(value).ok())
    }
}

/// First whole number in the text. Fractions are not recognized as whole numbers.
pub fn recognize_number(text: &str) -> Option<i64> {
    text.split(|ch: char| ch.is_whitespace() || ch == ',')
        .map(|token| token.trim_end_matches(|ch: char| ch.is_alphabetic() || ch == '.'))
        .find_map(|token| {
            if let Ok(value) = token.parse::<i64>() {
                return Some(Some(value));
            }
            // "25.5" is a number, but not an acceptable whole one.
            token.parse::<f64>().ok().map(|_| None)
        })
        .flatten()
}

/// Index of the choice the text selects: exact match, then ordinal, then containment.
pub fn recognize_choice(text: &str, choices: &[&str]) -> Option<usize> {
    let normalized = text.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }

    if let Some(index) = choices.iter().position(|choice| choice.to_lowercase() == normalized) {
        return Some(index);
    }

    if let Ok(ordinal) = normalized.parse::<usize>() {
        return (1..=choices.len()).contains(&ordinal).then(|| ordinal - 1);
    }

    choices.iter().position(|choice| {
        let choice = choice.to_lowercase();
        normalized.contains(&choice) || (normalized.len() >= 3 && choice.contains(&normalized))
    })
}

pub fn recognize_confirm(text: &str) -> Option<bool> {
    match text.trim().to_lowercase().trim_end_matches(['.', '!']) {
        "yes" | "y" | "yep" | "sure" | "ok" | "si" | "sí" | "claro" => Some(true),
        "no" | "n" | "nope" => Some(false),
        _ => None,
    }
}

/// Sign-in codes are six digits.
pub fn magic_code(text: &str) -> Option<&str> {
    let code = text.trim();
    (code.len() == 6 && code.chars().all(|ch| ch.is_ascii_digit())).then_some(code)
}
