//! Structural anomalies in the digits of a number.

use crate::models::{CanonicalNumber, PatternMatch, PatternTag};
use crate::normalizer::keypad_digit;
use std::sync::LazyLock;

const MIN_RUN: usize = 4;

/// `(country code, national prefixes)` that identify toll-free ranges.
const TOLL_FREE: &[(u16, &[&str])] = &[
    (1, &["800", "833", "844", "855", "866", "877", "888"]),
    (33, &["800", "805"]),
    (39, &["800", "803"]),
    (44, &["800", "808"]),
    (49, &["800"]),
    (55, &["800"]),
    (61, &["1800"]),
    (91, &["1800"]),
];

/// Premium-rate and Caribbean area codes commonly used in callback scams.
const KNOWN_SCAM: &[(u16, &[&str])] = &[
    (
        1,
        &[
            "900", "876", "809", "829", "849", "284", "473", "649", "268", "664", "767", "441",
            "758", "784", "869",
        ],
    ),
    (44, &["70"]),
];

/// Non-geographic and shared-cost business ranges.
const BUSINESS_LINE: &[(u16, &[&str])] = &[
    (33, &["81", "82"]),
    (34, &["901", "902"]),
    (39, &["84"]),
    (44, &["843", "844", "845", "870", "871", "872", "3"]),
    (49, &["180"]),
    (61, &["1300", "13"]),
];

const VANITY_WORDS: &[&str] = &[
    "CALL", "CASH", "LOAN", "TAXI", "PIZZA", "LAWYER", "FLOWERS", "HELP", "SAVE", "FREE",
    "MONEY", "CARS", "HOME", "DOCTOR", "DENTIST", "PLUMBER", "MOVERS", "HOTEL", "TICKET",
    "WINNER", "PRIZE", "LOTTERY", "CLAIM", "REFUND",
];

/// Vanity words in keypad encoding, longest first.
static VANITY_DIGITS: LazyLock<Vec<String>> = LazyLock::new(|| {
    let mut encoded: Vec<String> = VANITY_WORDS
        .iter()
        .map(|w| w.chars().filter_map(keypad_digit).collect())
        .collect();
    encoded.sort_by(|a: &String, b: &String| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    encoded.dedup();
    encoded
});

#[derive(Debug, Clone, Copy, Default)]
pub struct PatternAnalyzer;

impl PatternAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Tags in fixed order: prefix tags first, then digit-shape tags.
    pub fn analyze(&self, number: &CanonicalNumber) -> Vec<PatternMatch> {
        let cc = number.country_code();
        let national = number.national_number();
        let mut matches = Vec::new();

        for (tag, table) in [
            (PatternTag::TollFree, TOLL_FREE),
            (PatternTag::KnownScamPrefix, KNOWN_SCAM),
            (PatternTag::BusinessLine, BUSINESS_LINE),
        ] {
            if let Some(prefix) = match_prefix(table, cc, national) {
                matches.push(PatternMatch {
                    tag,
                    matched: prefix.to_string(),
                });
            }
        }

        if let Some(run) = repeating_run(national) {
            matches.push(PatternMatch {
                tag: PatternTag::RepeatingDigits,
                matched: run.to_string(),
            });
        }
        if let Some(run) = sequential_run(national) {
            matches.push(PatternMatch {
                tag: PatternTag::SequentialDigits,
                matched: run.to_string(),
            });
        }
        if let Some(word) = vanity_suffix(national) {
            matches.push(PatternMatch {
                tag: PatternTag::VanityNumber,
                matched: word.to_string(),
            });
        }

        if !matches.is_empty() {
            tracing::debug!("Patterns for {}: {:?}", number, matches);
        }
        matches
    }
}

/// Longest listed prefix of `national` for calling code `cc`.
fn match_prefix(table: &[(u16, &[&'static str])], cc: u16, national: &str) -> Option<&'static str> {
    table
        .iter()
        .filter(|(code, _)| *code == cc)
        .flat_map(|(_, prefixes)| prefixes.iter().copied())
        .filter(|p| national.starts_with(p))
        .max_by_key(|p| p.len())
}

/// First longest run of at least four identical digits.
fn repeating_run(digits: &str) -> Option<&str> {
    longest_run(digits, |prev, next| prev == next)
}

/// First longest ascending or descending step-1 run of at least four digits.
fn sequential_run(digits: &str) -> Option<&str> {
    let up = longest_run(digits, |prev, next| next == prev + 1);
    let down = longest_run(digits, |prev, next| prev == next + 1);
    match (up, down) {
        (Some(a), Some(b)) if b.len() > a.len() => Some(b),
        (Some(a), _) => Some(a),
        (None, b) => b,
    }
}

fn longest_run(digits: &str, step: impl Fn(u8, u8) -> bool) -> Option<&str> {
    let bytes = digits.as_bytes();
    let mut best: Option<(usize, usize)> = None;
    let mut start = 0;

    for i in 1..=bytes.len() {
        let continues = i < bytes.len()
            && bytes[i].is_ascii_digit()
            && bytes[i - 1].is_ascii_digit()
            && step(bytes[i - 1] - b'0', bytes[i] - b'0');
        if !continues {
            let len = i - start;
            if len >= MIN_RUN && best.map_or(true, |(_, l)| len > l) {
                best = Some((start, len));
            }
            start = i;
        }
    }

    best.map(|(s, l)| &digits[s..s + l])
}

fn vanity_suffix(digits: &str) -> Option<&'static str> {
    VANITY_DIGITS
        .iter()
        .find(|word| digits.len() > word.len() && digits.ends_with(word.as_str()))
        .map(String::as_str)
}
