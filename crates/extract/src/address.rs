//! Heuristic address splitting
//!
//! Splits a spoken one-line address into street / city / state / ZIP. The
//! split is acknowledged lossy: the authoritative structure comes from the
//! external validator, and this result is only the best-effort fallback
//! when validation is unavailable.

use once_cell::sync::Lazy;
use regex::Regex;

/// Two-letter US state and district codes
pub const STATE_CODES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
    "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
    "VA", "WA", "WV", "WI", "WY", "DC",
];

static ZIP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{5})(-\d{4})?\b").unwrap());

/// Components recovered from a spoken address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressParts {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

/// Split a free-form address utterance into components.
///
/// ZIP is taken by pattern, the state by a token-bounded match against
/// [`STATE_CODES`], and the remaining tokens are divided so the last one or
/// two become the city and the rest the street.
pub fn address_components(text: &str) -> AddressParts {
    let mut parts = AddressParts::default();
    let mut remaining = text.trim().to_string();

    if let Some(m) = ZIP_RE.find(&remaining) {
        parts.zip = m.as_str().chars().take(5).collect();
        remaining = format!("{}{}", &remaining[..m.start()], &remaining[m.end()..]);
    }

    // Token-bounded state match; last occurrence wins since the state
    // normally trails the city
    let tokens: Vec<&str> = remaining.split_whitespace().collect();
    let mut state_idx = None;
    for (i, token) in tokens.iter().enumerate() {
        let cleaned: String = token
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_uppercase();
        if cleaned.len() == 2 && STATE_CODES.contains(&cleaned.as_str()) {
            parts.state = cleaned;
            state_idx = Some(i);
        }
    }

    let tokens: Vec<String> = tokens
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != state_idx)
        .map(|(_, t)| t.trim_matches(|c: char| c == ',' || c == '.').to_string())
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.len() >= 3 {
        let city_words = if tokens.len() < 5 { 1 } else { 2 };
        parts.city = tokens[tokens.len() - city_words..].join(" ");
        parts.street = tokens[..tokens.len() - city_words].join(" ");
    } else {
        parts.street = tokens.join(" ");
    }

    parts
}
