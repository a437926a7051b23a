//! Correction detection
//!
//! Ordered rules over the user message; the first rule that matches wins.
//! Every pattern captures `original` (the value being replaced) and
//! `corrected` (the value the user wants instead).

use crate::models::NewCorrection;
use lazy_static::lazy_static;
use regex::Regex;

/// Words that open a hedge ("not sure but ...") rather than a replaced value
const HEDGE_WORDS: &[&str] = &["sure", "certain", "positive", "convinced", "really", "only", "just"];

/// Words that open a clause ("... but it lasts") rather than a replacement value
const CLAUSE_STARTERS: &[&str] = &[
    "i", "it", "it's", "we", "you", "they", "he", "she", "that", "this", "there", "maybe",
    "perhaps", "also", "still", "then",
];

/// Longest value, in words, a loosely anchored rule may capture
const MAX_LOOSE_VALUE_WORDS: usize = 4;

struct CorrectionRule {
    name: &'static str,
    pattern: Regex,
    /// The pattern has no correction cue ("sorry", "actually", ...) of its
    /// own, so captured values must look like values and not like prose
    loose: bool,
}

impl CorrectionRule {
    fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("valid correction pattern"),
            loose: false,
        }
    }

    fn loose(mut self) -> Self {
        self.loose = true;
        self
    }

    fn accepts(&self, original: &str, corrected: &str) -> bool {
        if original.is_empty() || corrected.is_empty() || original.eq_ignore_ascii_case(corrected) {
            return false;
        }
        if !self.loose {
            return true;
        }

        let first_word = |value: &str| {
            value
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_lowercase()
        };
        let word_count = |value: &str| value.split_whitespace().count();

        !HEDGE_WORDS.contains(&first_word(original).as_str())
            && !CLAUSE_STARTERS.contains(&first_word(corrected).as_str())
            && word_count(original) <= MAX_LOOSE_VALUE_WORDS
            && word_count(corrected) <= MAX_LOOSE_VALUE_WORDS
    }
}

lazy_static! {
    static ref CORRECTION_RULES: Vec<CorrectionRule> = vec![
        // "sorry, I meant X not Y"
        CorrectionRule::new(
            "sorry_meant",
            r"(?i)\bsorry\b[\s,.!]*i\s+meant\s+(?P<corrected>.+?)[\s,]+not\s+(?P<original>[^,.!?;\n]+)",
        ),
        // "actually it's X not Y"
        CorrectionRule::new(
            "actually_its",
            r"(?i)\bactually\b[\s,]*it(?:'s|’s|\s+is)\s+(?P<corrected>.+?)[\s,]+not\s+(?P<original>[^,.!?;\n]+)",
        ),
        // "no, I said X instead of Y"
        CorrectionRule::new(
            "said_instead",
            r"(?i)\bno\b[\s,.!]*i\s+said\s+(?P<corrected>.+?)[\s,]+instead\s+of\s+(?P<original>[^,.!?;\n]+)",
        ),
        // "not Y but X"
        CorrectionRule::new(
            "not_but",
            r"(?i)\bnot\s+(?P<original>.+?)[\s,]+but\s+(?P<corrected>[^,.!?;\n]+)",
        )
        .loose(),
        // "X → Y", "X -> Y", "X => Y"
        CorrectionRule::new(
            "arrow",
            r"(?P<original>[\w#./-]*\w)\s*(?:→|->|=>)\s*(?P<corrected>[\w#./-]*\w)",
        ),
    ];
}

/// Detect a correction in the user's message
///
/// Returns at most one correction, stamped with `turn_number`.
pub fn detect_correction(user_message: &str, turn_number: u32) -> Option<NewCorrection> {
    CORRECTION_RULES.iter().find_map(|rule| {
        let caps = rule.pattern.captures(user_message)?;
        let original = clean_value(caps.name("original")?.as_str());
        let corrected = clean_value(caps.name("corrected")?.as_str());

        if !rule.accepts(&original, &corrected) {
            return None;
        }

        tracing::debug!(rule = rule.name, original = %original, corrected = %corrected, "Correction detected");

        Some(NewCorrection {
            turn_number: Some(turn_number),
            original_value: original,
            corrected_value: corrected,
            context: Some(user_message.trim().to_string()),
        })
    })
}

fn clean_value(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '“' | '”' | '‘' | '’' | '`' | '*'))
        .trim_end_matches(|c: char| matches!(c, '.' | ',' | '!' | '?' | ';' | ':'))
        .trim()
        .to_string()
}
