//! Spoken day/time resolution against candidate slots
//!
//! Callers say things like "tomorrow at 2", "Friday morning", or "10:30".
//! Rather than parse to an absolute instant, the phrase is resolved against
//! the slots actually on offer: the candidate whose start time is closest
//! wins. When AM/PM is unspecified, both interpretations are evaluated and
//! whichever lands nearer to any candidate is used.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;

use intake_agent_core::AppointmentSlot;

static TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2})(?::(\d{2}))?\s*(a\.?m\.?|p\.?m\.?)?\b").unwrap()
});

const DAY_WORDS: &[&str] = &[
    "today",
    "tomorrow",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

fn detect_day_word(lowered: &str) -> Option<&'static str> {
    DAY_WORDS.iter().copied().find(|w| lowered.contains(w))
}

fn weekday_of(word: &str) -> Option<Weekday> {
    match word {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Date the day word refers to, relative to `now`
fn target_date(word: &str, now: DateTime<Utc>) -> NaiveDate {
    match word {
        "today" => now.date_naive(),
        "tomorrow" => (now + Duration::days(1)).date_naive(),
        _ => {
            // Next occurrence of the named weekday, never today
            let target = weekday_of(word).unwrap_or(Weekday::Mon);
            let current = now.weekday().num_days_from_monday() as i64;
            let wanted = target.num_days_from_monday() as i64;
            let mut delta = (wanted - current).rem_euclid(7);
            if delta == 0 {
                delta = 7;
            }
            (now + Duration::days(delta)).date_naive()
        }
    }
}

fn to_hour24(hour: u32, pm: bool) -> u32 {
    (hour % 12) + if pm { 12 } else { 0 }
}

/// Resolve a spoken day/time phrase to the index of the closest candidate
/// slot, or `None` when the phrase carries no usable day or time.
pub fn resolve_slot_phrase(
    text: &str,
    slots: &[AppointmentSlot],
    now: DateTime<Utc>,
) -> Option<usize> {
    if slots.is_empty() {
        return None;
    }
    let lowered = text.to_lowercase();

    let day_word = detect_day_word(&lowered);
    let base_date = match day_word {
        Some(word) => target_date(word, now),
        None => slots[0].starts_at.date_naive(),
    };

    if let Some(caps) = TIME_RE.captures(&lowered) {
        let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
        let minute: u32 = caps
            .get(2)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
        let meridiem = caps.get(3).map(|m| m.as_str().replace('.', ""));

        if hour <= 23 && minute <= 59 {
            // Candidate instants: one when AM/PM is known or the hour is
            // already 24-hour, otherwise both readings
            let hours: Vec<u32> = match meridiem.as_deref() {
                Some(m) if m.starts_with('p') => vec![to_hour24(hour, true)],
                Some(_) => vec![to_hour24(hour, false)],
                None if hour > 12 => vec![hour],
                None => vec![to_hour24(hour, false), to_hour24(hour, true)],
            };

            let mut best: Option<(usize, i64)> = None;
            for h in hours {
                let Some(naive) = base_date.and_hms_opt(h, minute, 0) else {
                    continue;
                };
                let target = Utc.from_utc_datetime(&naive);

                // Prefer same-day slots; fall back to the full list
                let same_day: Vec<usize> = (0..slots.len())
                    .filter(|&i| slots[i].starts_at.date_naive() == target.date_naive())
                    .collect();
                let pool = if same_day.is_empty() {
                    (0..slots.len()).collect()
                } else {
                    same_day
                };

                for i in pool {
                    let delta = (slots[i].starts_at - target).num_seconds().abs();
                    if best.map_or(true, |(_, d)| delta < d) {
                        best = Some((i, delta));
                    }
                }
            }
            if best.is_some() {
                return best.map(|(i, _)| i);
            }
        }
    }

    // Day word alone: first slot on that date
    day_word.and_then(|_| {
        slots
            .iter()
            .position(|s| s.starts_at.date_naive() == base_date)
    })
}
