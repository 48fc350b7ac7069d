//! Permissive extraction utilities for spoken intake input
//!
//! Pure, deterministic functions that parse free-form transcribed speech
//! into typed values. Every function returns `Option` (or a best-effort
//! struct) and never panics on malformed input; callers decide how to
//! re-prompt. Speech transcription is noisy, so these lean permissive:
//! filler words are stripped, digits are accepted in any grouping, and
//! ambiguous times are resolved against the actual candidate slots.

mod address;
mod datetime;

pub use address::{address_components, AddressParts, STATE_CODES};
pub use datetime::resolve_slot_phrase;

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}\b").unwrap()
});

static ALNUM_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[A-Z0-9]{4,}\b").unwrap());

static DIGIT_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

static PAIN_SCALE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(10|[1-9])\b").unwrap());

/// Filler words stripped before member-ID extraction
const MEMBER_ID_FILLER: &[&str] = &["MEMBER", "NUMBER", "IT'S", "IT IS", "ID", "IS", "MY"];

/// Every digit in the input, in order
pub fn digits(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Extract a US phone number and normalize it to `(XXX) XXX-XXXX`.
///
/// Accepts exactly 10 digits, or 11 digits with a leading country code `1`
/// (which is stripped). Anything else is no match.
pub fn phone_number(text: &str) -> Option<String> {
    let mut d = digits(text);
    if d.len() == 11 && d.starts_with('1') {
        d.remove(0);
    }
    if d.len() != 10 {
        return None;
    }
    Some(format!("({}) {}-{}", &d[0..3], &d[3..6], &d[6..10]))
}

/// Extract an email address, lower-cased
pub fn email(text: &str) -> Option<String> {
    EMAIL_RE.find(text).map(|m| m.as_str().to_lowercase())
}

/// Extract a 5-digit ZIP or 9-digit ZIP+4 (`XXXXX-XXXX`)
pub fn zip_code(text: &str) -> Option<String> {
    let d = digits(text);
    match d.len() {
        5 => Some(d),
        9 => Some(format!("{}-{}", &d[0..5], &d[5..9])),
        _ => None,
    }
}

/// Extract an insurance member ID.
///
/// Strips conversational filler ("my member id is ..."), drops everything
/// except alphanumerics and hyphens, and requires at least 5 characters of
/// the result.
pub fn insurance_member_id(text: &str) -> Option<String> {
    let mut cleaned = text.to_uppercase();
    for word in MEMBER_ID_FILLER {
        cleaned = cleaned.replace(word, " ");
    }
    let cleaned: String = cleaned
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    if cleaned.len() >= 5 {
        Some(cleaned)
    } else {
        None
    }
}

/// Looser fallback: the first alphanumeric run of at least 4 characters,
/// after filler removal. Used once member-ID retries are exhausted.
pub fn loose_alphanumeric_run(text: &str) -> Option<String> {
    let mut cleaned = text.to_uppercase();
    for word in MEMBER_ID_FILLER {
        cleaned = cleaned.replace(word, " ");
    }
    ALNUM_RUN_RE
        .find(&cleaned)
        .map(|m| m.as_str().to_string())
}

/// Map a spoken choice to a 1-based number.
///
/// Handles digits ("3"), cardinals ("three"), and ordinals ("third") up to
/// ten, then falls back to the first digit run anywhere in the input.
pub fn number_word(text: &str) -> Option<u32> {
    let trimmed = text.trim();
    if let Ok(n) = trimmed.parse::<u32>() {
        return Some(n);
    }

    const WORDS: &[(&str, u32)] = &[
        ("one", 1),
        ("first", 1),
        ("two", 2),
        ("second", 2),
        ("three", 3),
        ("third", 3),
        ("four", 4),
        ("fourth", 4),
        ("five", 5),
        ("fifth", 5),
        ("six", 6),
        ("sixth", 6),
        ("seven", 7),
        ("seventh", 7),
        ("eight", 8),
        ("eighth", 8),
        ("nine", 9),
        ("ninth", 9),
        ("ten", 10),
        ("tenth", 10),
    ];

    let lowered = trimmed.to_lowercase();
    for (word, n) in WORDS {
        if lowered.split_whitespace().any(|t| t == *word) {
            return Some(*n);
        }
    }

    DIGIT_RUN_RE
        .find(trimmed)
        .and_then(|m| m.as_str().parse().ok())
}

/// Extract a 1-10 pain-scale rating
pub fn pain_scale(text: &str) -> Option<u8> {
    PAIN_SCALE_RE
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
}
